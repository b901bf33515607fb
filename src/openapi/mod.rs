use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Harvest API",
        version = "1.0.0",
        description = r#"
# Harvest Tracking API

Record daily harvests against your own categories and descriptions, then read totals.

## Features

- **Categories**: ordered groups of descriptions; deactivating one deactivates its descriptions
- **Descriptions**: the things you harvest, optionally nested under a parent description
- **Batch editing**: create, update and deactivate descriptions in one transaction
- **Harvests**: amount, unit and calendar day for each pick
- **Reports**: totals per unit over a date range

## Batch semantics

All operations of a batch run in order inside one transaction. An operation that fails is
rolled back on its own and reported in `errors`; the rest are committed. If every operation
fails, nothing is committed and the request fails with `All operations failed`.

## Error Handling

Every error uses the same envelope:

```json
{
  "success": false,
  "data": null,
  "error": "Bad Request",
  "message": "Invalid description ID",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "descriptions", description = "Descriptions and batch editing"),
        (name = "categories", description = "Category management"),
        (name = "harvests", description = "Harvest records"),
        (name = "reports", description = "Harvest aggregates")
    ),
    paths(
        // Descriptions
        crate::handlers::descriptions::batch_descriptions,
        crate::handlers::descriptions::list_descriptions,
        crate::handlers::descriptions::create_description,
        crate::handlers::descriptions::get_description,
        crate::handlers::descriptions::update_description,
        crate::handlers::descriptions::patch_description,
        crate::handlers::descriptions::delete_description,
        crate::handlers::descriptions::restore_description,

        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::categories::restore_category,
        crate::handlers::categories::reorder_categories,

        // Harvests
        crate::handlers::harvests::list_harvests,
        crate::handlers::harvests::create_harvest,
        crate::handlers::harvests::get_harvest,
        crate::handlers::harvests::update_harvest,
        crate::handlers::harvests::delete_harvest,

        // Reports
        crate::handlers::reports::harvest_report,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::entities::RecordStatus,
            crate::entities::MetadataKind,
            crate::entities::MetadataValue,

            // Records
            crate::entities::category::Model,
            crate::entities::description::Model,
            crate::entities::harvest::Model,
            crate::entities::harvest::HarvestUnit,

            // Descriptions and batch
            crate::services::descriptions::CreateDescriptionInput,
            crate::services::descriptions::DescriptionChanges,
            crate::services::descriptions::DescriptionView,
            crate::handlers::descriptions::PatchDescriptionRequest,
            crate::services::batch::BatchOperationKind,
            crate::services::batch::BatchOperation,
            crate::services::batch::BatchRequest,
            crate::services::batch::BatchError,
            crate::services::batch::BatchResponse,

            // Categories
            crate::services::categories::CreateCategoryInput,
            crate::services::categories::UpdateCategoryInput,
            crate::services::categories::ReorderCategoriesInput,

            // Harvests and reports
            crate::services::harvests::CreateHarvestInput,
            crate::services::harvests::UpdateHarvestInput,
            crate::services::harvests::HarvestView,
            crate::services::harvests::HarvestDescription,
            crate::services::reports::HarvestReport,
            crate::services::reports::UnitTotal,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_batch_route() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Harvest API"));
        assert!(json.contains("/api/v1/descriptions/batch"));
        assert!(json.contains("/api/v1/reports/harvests"));
    }
}
