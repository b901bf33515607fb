//! Transactional batch editing of descriptions.
//!
//! All operations of a request run in one transaction, in submission order.
//! Each operation runs inside its own savepoint so a failing operation leaves
//! no partial writes behind and later operations still see the effects of
//! earlier successful ones. If every operation fails the transaction is rolled
//! back; otherwise it commits with the failures reported alongside the results.

use crate::{
    cache::ListingCache,
    db::TrackedTransaction,
    errors::{format_validation_errors, ServiceError},
    object_id::is_object_id,
    services::descriptions::{
        apply_changes, duplicate_text, find_description, find_duplicate, insert_description,
        populate_one, CreateDescriptionInput, DescriptionChanges, DescriptionView,
    },
    services::status_cascade,
};
use metrics::{counter, histogram};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Reported id for operations that carry none (creates)
pub const UNKNOWN_OPERATION_ID: &str = "unknown";

const SHAPE_ERROR: &str =
    "Create operations require data but no ID, other operations require an ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BatchOperationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BatchOperation {
    #[serde(rename = "type")]
    pub kind: BatchOperationKind,
    /// Target description; required for update and delete, forbidden for create
    pub id: Option<String>,
    pub data: Option<DescriptionChanges>,
}

impl BatchOperation {
    fn has_valid_shape(&self) -> bool {
        match self.kind {
            BatchOperationKind::Create => self.data.is_some() && self.id.is_none(),
            BatchOperationKind::Update | BatchOperationKind::Delete => self.id.is_some(),
        }
    }

    fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| UNKNOWN_OPERATION_ID.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BatchRequest {
    pub operations: Vec<BatchOperation>,
}

impl BatchRequest {
    /// Request-level checks; any failure rejects the whole batch before a
    /// transaction is opened.
    pub fn check_shape(&self) -> Result<(), ServiceError> {
        let count = self.operations.len();
        if count == 0 || count > MAX_BATCH_OPERATIONS {
            return Err(ServiceError::ValidationError(format!(
                "Batch must contain between 1 and {} operations",
                MAX_BATCH_OPERATIONS
            )));
        }

        if !self.operations.iter().all(BatchOperation::has_valid_shape) {
            return Err(ServiceError::ValidationError(SHAPE_ERROR.to_string()));
        }

        for (index, op) in self.operations.iter().enumerate() {
            if let Some(id) = op.id.as_deref() {
                if !is_object_id(id) {
                    return Err(ServiceError::ValidationError(format!(
                        "Operation {}: invalid id '{}'",
                        index, id
                    )));
                }
            }
            if let Some(data) = &op.data {
                data.validate().map_err(|e| {
                    ServiceError::ValidationError(format!(
                        "Operation {}: {}",
                        index,
                        format_validation_errors(&e)
                    ))
                })?;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BatchError {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchResponse {
    pub success: bool,
    /// Results of the successful operations, in submission order
    pub data: Vec<DescriptionView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<BatchError>>,
}

#[derive(Clone)]
pub struct BatchOperationProcessor {
    db: Arc<DatabaseConnection>,
    cache: ListingCache,
}

impl BatchOperationProcessor {
    pub fn new(db: Arc<DatabaseConnection>, cache: ListingCache) -> Self {
        Self { db, cache }
    }

    #[instrument(skip(self, request), fields(operations = request.operations.len()))]
    pub async fn process(&self, request: BatchRequest) -> Result<BatchResponse, ServiceError> {
        request.check_shape()?;

        let started = Instant::now();
        let total = request.operations.len();
        let txn = TrackedTransaction::begin(&*self.db).await?;

        let mut data = Vec::with_capacity(total);
        let mut errors = Vec::new();

        for op in request.operations {
            let label = op.label();
            let kind = op.kind;

            // A failed savepoint begin/commit/rollback means the transaction
            // itself is unusable; returning drops `txn`, which rolls it back.
            let savepoint = txn.conn().begin().await?;
            match apply_operation(&savepoint, op).await {
                Ok(view) => {
                    savepoint.commit().await?;
                    data.push(view);
                }
                Err(err) => {
                    savepoint.rollback().await?;
                    warn!(operation = %kind, id = %label, error = %err, "batch operation failed");
                    errors.push(BatchError {
                        id: label,
                        error: err.response_message(),
                    });
                }
            }
        }

        counter!("harvest_batch.operations", total as u64);
        counter!("harvest_batch.operations_failed", errors.len() as u64);

        let transaction_id = txn.id();
        if errors.len() == total {
            txn.rollback().await?;
            counter!("harvest_batch.aborted", 1);
            warn!(%transaction_id, total, "all batch operations failed");
            let details = errors
                .iter()
                .map(|e| format!("{}: {}", e.id, e.error))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ServiceError::AllOperationsFailed { details });
        }

        txn.commit().await?;
        self.cache.invalidate_descriptions().await;

        histogram!("harvest_batch.duration", started.elapsed());
        info!(
            %transaction_id,
            succeeded = data.len(),
            failed = errors.len(),
            "batch committed"
        );

        Ok(BatchResponse {
            success: true,
            data,
            errors: (!errors.is_empty()).then_some(errors),
        })
    }
}

async fn apply_operation<C>(conn: &C, op: BatchOperation) -> Result<DescriptionView, ServiceError>
where
    C: ConnectionTrait,
{
    match op.kind {
        BatchOperationKind::Create => {
            let data = op.data.ok_or_else(|| {
                ServiceError::ValidationError("Data is required for create operations".to_string())
            })?;
            let input = CreateDescriptionInput::try_from(data)?;
            if find_duplicate(conn, &input.category_id, &input.description, None)
                .await?
                .is_some()
            {
                return Err(duplicate_text());
            }
            let created = insert_description(conn, input).await?;
            populate_one(conn, created).await
        }
        BatchOperationKind::Update => {
            let (Some(id), Some(data)) = (op.id, op.data) else {
                return Err(ServiceError::ValidationError(
                    "ID and data are required for update operations".to_string(),
                ));
            };
            let existing = find_description(conn, &id).await?;
            let updated = apply_changes(conn, existing, data).await?;
            populate_one(conn, updated).await
        }
        BatchOperationKind::Delete => {
            let id = op.id.ok_or_else(|| {
                ServiceError::ValidationError("ID is required for delete operations".to_string())
            })?;
            let existing = find_description(conn, &id).await?;
            let deactivated = status_cascade::deactivate(conn, existing).await?;
            populate_one(conn, deactivated).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const ID: &str = "665f1c2a9b1e8a3d4c5f6a7b";

    fn request(value: serde_json::Value) -> BatchRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn well_formed_batch_passes() {
        let req = request(json!({ "operations": [
            { "type": "create", "data": { "description": "Tomato", "categoryId": ID, "userId": "u1" } },
            { "type": "update", "id": ID, "data": { "status": "archived" } },
            { "type": "delete", "id": ID }
        ]}));
        assert!(req.check_shape().is_ok());
    }

    #[test]
    fn empty_and_oversized_batches_are_rejected() {
        assert_matches!(
            request(json!({ "operations": [] })).check_shape(),
            Err(ServiceError::ValidationError(_))
        );

        let ops: Vec<_> = (0..=MAX_BATCH_OPERATIONS)
            .map(|_| json!({ "type": "delete", "id": ID }))
            .collect();
        assert_matches!(
            request(json!({ "operations": ops })).check_shape(),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn create_with_id_is_a_shape_error() {
        let req = request(json!({ "operations": [
            { "type": "create", "id": ID, "data": { "description": "Tomato" } }
        ]}));
        assert_matches!(req.check_shape(), Err(ServiceError::ValidationError(msg)) if msg == SHAPE_ERROR);
    }

    #[test]
    fn create_without_data_and_delete_without_id_are_shape_errors() {
        for op in [json!({ "type": "create" }), json!({ "type": "delete" })] {
            let req = request(json!({ "operations": [op] }));
            assert_matches!(req.check_shape(), Err(ServiceError::ValidationError(msg)) if msg == SHAPE_ERROR);
        }
    }

    #[test]
    fn update_without_data_passes_shape_check() {
        // Reported per operation at execution time instead
        let req = request(json!({ "operations": [{ "type": "update", "id": ID }] }));
        assert!(req.check_shape().is_ok());
    }

    #[test]
    fn malformed_id_and_data_are_rejected_up_front() {
        let req = request(json!({ "operations": [{ "type": "delete", "id": "123" }] }));
        assert_matches!(req.check_shape(), Err(ServiceError::ValidationError(msg)) if msg.contains("invalid id"));

        let req = request(json!({ "operations": [
            { "type": "create", "data": { "description": "", "categoryId": ID, "userId": "u1" } }
        ]}));
        assert_matches!(req.check_shape(), Err(ServiceError::ValidationError(msg)) if msg.starts_with("Operation 0: description"));
    }

    #[test]
    fn unknown_operation_type_fails_to_deserialize() {
        let parsed = serde_json::from_value::<BatchRequest>(json!({
            "operations": [{ "type": "upsert", "id": ID }]
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn errors_are_omitted_when_empty() {
        let response = BatchResponse {
            success: true,
            data: vec![],
            errors: None,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("errors").is_none());
        assert_eq!(value["success"], true);
    }
}
