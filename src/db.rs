use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, histogram};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DatabaseTransaction, TransactionTrait};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

fn connect_options(cfg: &AppConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(cfg.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(cfg.db_idle_timeout_secs))
        .sqlx_logging(false);
    opt
}

/// Opens the connection pool described by `cfg`.
pub async fn establish_connection_from_app_config(
    cfg: &AppConfig,
) -> Result<DatabaseConnection, ServiceError> {
    info!(
        max_connections = cfg.db_max_connections,
        backend = cfg.database_url.split(':').next().unwrap_or("unknown"),
        "connecting to database"
    );
    Database::connect(connect_options(cfg)).await.map_err(|e| {
        error!(error = %e, "database connection failed");
        ServiceError::DatabaseError(e)
    })
}

/// Applies every pending migration.
pub async fn run_migrations(pool: &DatabaseConnection) -> Result<(), ServiceError> {
    let started = Instant::now();
    crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(|e| {
            error!(error = %e, "migrations failed");
            ServiceError::DatabaseError(e)
        })?;
    info!(elapsed = ?started.elapsed(), "migrations applied");
    Ok(())
}

pub async fn close_pool(pool: DatabaseConnection) -> Result<(), ServiceError> {
    info!("closing database pool");
    pool.close().await.map_err(ServiceError::DatabaseError)
}

/// A transaction tagged with an id for logs, timed on completion.
///
/// Dropping it without [`commit`](Self::commit) or [`rollback`](Self::rollback)
/// rolls the underlying transaction back.
pub struct TrackedTransaction {
    txn: DatabaseTransaction,
    id: Uuid,
    started: Instant,
}

impl TrackedTransaction {
    pub async fn begin<C: TransactionTrait>(db: &C) -> Result<Self, ServiceError> {
        let txn = db.begin().await?;
        let id = Uuid::new_v4();
        debug!(transaction_id = %id, "transaction started");
        Ok(Self {
            txn,
            id,
            started: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn conn(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), ServiceError> {
        let Self { txn, id, started } = self;
        if let Err(e) = txn.commit().await {
            counter!("harvest_db_transactions_total", 1, "outcome" => "commit_failed");
            error!(transaction_id = %id, error = %e, "transaction commit failed");
            return Err(ServiceError::DatabaseError(e));
        }
        histogram!("harvest_db_transaction_duration_seconds", started.elapsed());
        counter!("harvest_db_transactions_total", 1, "outcome" => "committed");
        debug!(transaction_id = %id, elapsed = ?started.elapsed(), "transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), ServiceError> {
        let Self { txn, id, started } = self;
        let result = txn.rollback().await.map_err(ServiceError::DatabaseError);
        histogram!("harvest_db_transaction_duration_seconds", started.elapsed());
        counter!("harvest_db_transactions_total", 1, "outcome" => "rolled_back");
        warn!(transaction_id = %id, elapsed = ?started.elapsed(), "transaction rolled back");
        result
    }
}
