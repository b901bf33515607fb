//! Harvest API Library
//!
//! Categories, descriptions and harvests over HTTP, with transactional batch
//! editing of descriptions and one-level deactivation cascade.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod cache;
pub mod common;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod middleware_helpers;
pub mod migrator;
pub mod object_id;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{extract::MatchedPath, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use utoipa::ToSchema;

use crate::cache::ListingCache;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Builds every service on top of one storage client.
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let cache = ListingCache::in_memory(config.listing_cache_ttl());
        let services = handlers::AppServices::new(db.clone(), cache);
        Self {
            db,
            config,
            services,
        }
    }
}

/// Success envelope: `{ success, data, message?, meta }`
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Routes mounted under `/api/v1`
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .nest("/descriptions", handlers::descriptions::routes())
        .nest("/categories", handlers::categories::routes())
        .nest("/harvests", handlers::harvests::routes())
        .nest("/reports", handlers::reports::routes())
}

/// The full application router without transport layers (CORS, compression).
pub fn app_router(state: AppState) -> Router {
    let db = state.db.clone();
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .route_layer(axum::middleware::from_fn(record_request_metrics))
        .with_state(state)
        .nest("/health", health::health_routes_with_state(db))
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        // Outermost so every layer and handler sees the request id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
}

async fn api_status() -> ApiResult<Value> {
    Ok(Json(ApiResponse::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))))
}

/// Records latency per matched route and status class.
async fn record_request_metrics(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = request.method().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status();
    if status.is_server_error() {
        ::tracing::warn!(%method, %route, status = status.as_u16(), "request failed");
    }
    metrics::histogram!(
        "harvest_http_request_duration_seconds",
        elapsed,
        "method" => method,
        "route" => route,
        "status" => format!("{}xx", status.as_u16() / 100)
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn message_is_omitted_unless_set() {
        let plain = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert!(plain.get("message").is_none());
        assert_eq!(plain["success"], true);

        let noted = serde_json::to_value(ApiResponse::success(1).with_message("done")).unwrap();
        assert_eq!(noted["message"], "done");
    }
}

