// Description editing
pub mod batch;
pub mod descriptions;
pub mod status_cascade;

// Catalog and records
pub mod categories;
pub mod harvests;

// Aggregates
pub mod reports;
