use crate::{
    cache::ListingCache,
    db::TrackedTransaction,
    entities::{category, description, match_key, validate_metadata, Metadata, RecordStatus},
    errors::ServiceError,
    object_id::{new_object_id, validate_object_id},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr,
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn validate_name(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 || len > 100 {
        let mut err = ValidationError::new("name");
        err.message = Some("must be between 1 and 100 characters".into());
        return Err(err);
    }
    Ok(())
}

fn validate_ids(ids: &[String]) -> Result<(), ValidationError> {
    ids.iter().try_for_each(|id| validate_object_id(id))
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryInput {
    #[validate(custom = "validate_name")]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub status: Option<RecordStatus>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryInput {
    #[validate(custom = "validate_name")]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReorderCategoriesInput {
    /// Category ids in their new display order
    #[validate(length(min = 1), custom = "validate_ids")]
    pub ordered_ids: Vec<String>,
}

async fn find_category<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<category::Model, ServiceError> {
    category::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Category"))
}

async fn find_by_name<C: ConnectionTrait>(
    conn: &C,
    name: &str,
) -> Result<Option<category::Model>, ServiceError> {
    Ok(category::Entity::find()
        .filter(category::Column::NameKey.eq(match_key(name)))
        .one(conn)
        .await?)
}

fn name_taken(name: &str) -> ServiceError {
    ServiceError::Conflict(format!("A category named '{}' already exists", name.trim()))
}

/// Sets the status of every description in a category, without per-row cascade.
async fn set_descriptions_status<C: ConnectionTrait>(
    conn: &C,
    category_id: &str,
    status: RecordStatus,
) -> Result<u64, ServiceError> {
    let result = description::Entity::update_many()
        .col_expr(description::Column::Status, Expr::value(status))
        .col_expr(description::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(description::Column::CategoryId.eq(category_id))
        .filter(description::Column::Status.ne(status))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
    cache: ListingCache,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>, cache: ListingCache) -> Self {
        Self { db, cache }
    }

    /// Active categories in display order
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<category::Model>, ServiceError> {
        Ok(category::Entity::find()
            .filter(category::Column::Status.eq(RecordStatus::Active))
            .order_by_asc(category::Column::Order)
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Creates a category, or returns the existing one whose name matches
    /// case-insensitively. The flag is `true` when a row was inserted.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: CreateCategoryInput,
    ) -> Result<(category::Model, bool), ServiceError> {
        let db = &*self.db;
        if let Some(existing) = find_by_name(db, &input.name).await? {
            info!(category_id = %existing.id, "Category already exists");
            return Ok((existing, false));
        }

        let now = Utc::now();
        let inserted = category::ActiveModel {
            id: Set(new_object_id()),
            name_key: Set(match_key(&input.name)),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description.map(|d| d.trim().to_string())),
            status: Set(input.status.unwrap_or_default()),
            order: Set(input.order.unwrap_or(0)),
            metadata: Set(input.metadata.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::from);

        let created = match inserted {
            Ok(created) => created,
            // Lost a race with a concurrent create of the same name
            Err(e) if e.is_unique_violation() => {
                return match find_by_name(db, &input.name).await? {
                    Some(existing) => Ok((existing, false)),
                    None => Err(name_taken(&input.name)),
                };
            }
            Err(e) => return Err(e),
        };

        info!(category_id = %created.id, "Created category");
        Ok((created, true))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<category::Model, ServiceError> {
        find_category(&*self.db, id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: UpdateCategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let db = &*self.db;
        let existing = find_category(db, id).await?;

        if let Some(name) = input.name.as_deref() {
            if let Some(other) = find_by_name(db, name).await? {
                if other.id != existing.id {
                    return Err(name_taken(&other.name));
                }
            }
        }

        let input_name = input.name.clone();
        let mut active: category::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description.trim().to_string()));
        }
        if let Some(order) = input.order {
            active.order = Set(order);
        }
        if let Some(metadata) = input.metadata {
            active.metadata = Set(metadata);
        }

        let updated = active.update(db).await.map_err(|e| {
            let err = ServiceError::from(e);
            match input_name {
                Some(name) if err.is_unique_violation() => name_taken(&name),
                _ => err,
            }
        })?;
        // Listings embed the category
        self.cache.invalidate_descriptions().await;
        info!(category_id = %updated.id, "Updated category");
        Ok(updated)
    }

    /// Soft delete: the category and all of its descriptions become inactive.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: &str) -> Result<category::Model, ServiceError> {
        self.set_status(id, RecordStatus::Inactive).await
    }

    /// Reactivates the category and all of its descriptions.
    #[instrument(skip(self))]
    pub async fn restore(&self, id: &str) -> Result<category::Model, ServiceError> {
        self.set_status(id, RecordStatus::Active).await
    }

    async fn set_status(
        &self,
        id: &str,
        status: RecordStatus,
    ) -> Result<category::Model, ServiceError> {
        let txn = TrackedTransaction::begin(&*self.db).await?;
        let existing = find_category(txn.conn(), id).await?;

        let mut active: category::ActiveModel = existing.into();
        active.status = Set(status);
        let updated = active.update(txn.conn()).await?;
        let descriptions = set_descriptions_status(txn.conn(), id, status).await?;
        txn.commit().await?;

        self.cache.invalidate_descriptions().await;
        info!(category_id = %id, %status, descriptions, "Changed category status");
        Ok(updated)
    }

    /// Sets each category's `order` to its position in `ordered_ids`.
    #[instrument(skip(self, input), fields(count = input.ordered_ids.len()))]
    pub async fn reorder(
        &self,
        input: ReorderCategoriesInput,
    ) -> Result<Vec<category::Model>, ServiceError> {
        let mut seen = HashSet::new();
        if let Some(dup) = input.ordered_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(ServiceError::ValidationError(format!(
                "Category {} appears more than once",
                dup
            )));
        }

        let txn = TrackedTransaction::begin(&*self.db).await?;
        let mut reordered = Vec::with_capacity(input.ordered_ids.len());
        for (index, id) in input.ordered_ids.iter().enumerate() {
            let existing = find_category(txn.conn(), id).await?;
            let order = i32::try_from(index)
                .map_err(|_| ServiceError::ValidationError("Too many categories".to_string()))?;
            let mut active: category::ActiveModel = existing.into();
            active.order = Set(order);
            reordered.push(active.update(txn.conn()).await?);
        }
        txn.commit().await?;

        self.cache.invalidate_descriptions().await;
        info!(count = reordered.len(), "Reordered categories");
        Ok(reordered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_bounded_after_trimming() {
        assert!(validate_name("Herbs").is_ok());
        assert!(validate_name("  ").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn reorder_requires_valid_ids() {
        let input = ReorderCategoriesInput {
            ordered_ids: vec!["665f1c2a9b1e8a3d4c5f6a7b".into(), "bad".into()],
        };
        assert!(input.validate().is_err());

        let empty = ReorderCategoriesInput {
            ordered_ids: vec![],
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn negative_order_is_rejected() {
        let input = CreateCategoryInput {
            name: "Roots".into(),
            description: None,
            status: None,
            order: Some(-1),
            metadata: None,
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("order"));
    }
}
