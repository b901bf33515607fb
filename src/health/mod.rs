//! Probe endpoints mounted under `/health`.
//!
//! - `/health` up/down including a database ping
//! - `/health/ready` database reachable and no migrations pending
//! - `/health/live` process responds; nothing else is checked
//! - `/health/version` build information

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::migrator::Migrator;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    fn from_ok(ok: bool) -> Self {
        if ok {
            Self::Up
        } else {
            Self::Down
        }
    }

    fn status_code(self) -> StatusCode {
        match self {
            Self::Up => StatusCode::OK,
            Self::Down => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub database: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

pub struct HealthState {
    db: Arc<DatabaseConnection>,
    started: Instant,
}

impl HealthState {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            started: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    async fn database(&self) -> HealthStatus {
        let ping = self.db.ping().await;
        if let Err(e) = &ping {
            warn!(error = %e, "database ping failed");
        }
        HealthStatus::from_ok(ping.is_ok())
    }

    async fn pending_migrations(&self) -> Option<usize> {
        match Migrator::get_pending_migrations(&*self.db).await {
            Ok(pending) => Some(pending.len()),
            Err(e) => {
                warn!(error = %e, "could not read migration state");
                None
            }
        }
    }

    pub async fn check(&self) -> HealthInfo {
        let database = self.database().await;
        HealthInfo {
            status: database,
            database,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

pub async fn health_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let health = state.check().await;
    debug!(status = ?health.status, "health check");
    (health.status.status_code(), Json(health))
}

pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let database = state.database().await;
    let pending = match database {
        HealthStatus::Up => state.pending_migrations().await,
        HealthStatus::Down => None,
    };
    let ready = pending == Some(0);
    (
        HealthStatus::from_ok(ready).status_code(),
        Json(json!({
            "ready": ready,
            "database": database,
            "pendingMigrations": pending,
            "timestamp": Utc::now(),
        })),
    )
}

pub async fn liveness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    Json(json!({
        "alive": true,
        "uptimeSeconds": state.uptime_seconds(),
        "timestamp": Utc::now(),
    }))
}

pub async fn version_info() -> impl IntoResponse {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("GIT_HASH").unwrap_or("unknown"),
    }))
}

pub fn health_routes_with_state(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
        .route("/version", get(version_info))
        .with_state(Arc::new(HealthState::new(db)))
}
