pub mod categories;
pub mod common;
pub mod descriptions;
pub mod harvests;
pub mod reports;

use crate::{
    cache::ListingCache,
    services::{
        batch::BatchOperationProcessor, categories::CategoryService,
        descriptions::DescriptionService, harvests::HarvestService, reports::ReportService,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub descriptions: Arc<DescriptionService>,
    pub batch: Arc<BatchOperationProcessor>,
    pub categories: Arc<CategoryService>,
    pub harvests: Arc<HarvestService>,
    pub reports: Arc<ReportService>,
}

impl AppServices {
    /// Wires every service to one storage client and one listing cache.
    pub fn new(db: Arc<DatabaseConnection>, cache: ListingCache) -> Self {
        Self {
            descriptions: Arc::new(DescriptionService::new(db.clone(), cache.clone())),
            batch: Arc::new(BatchOperationProcessor::new(db.clone(), cache.clone())),
            categories: Arc::new(CategoryService::new(db.clone(), cache)),
            harvests: Arc::new(HarvestService::new(db.clone())),
            reports: Arc::new(ReportService::new(db)),
        }
    }
}
