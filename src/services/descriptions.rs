use crate::{
    cache::ListingCache,
    db::TrackedTransaction,
    entities::{category, description, match_key, validate_metadata, Metadata, RecordStatus},
    errors::ServiceError,
    object_id::{is_object_id, new_object_id, validate_object_id},
    services::status_cascade,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

pub const MAX_DESCRIPTION_LEN: usize = 1000;

const DUPLICATE_TEXT: &str = "A description with this text already exists in the category";

/// Longest parent chain walked when checking for cycles
const MAX_ANCESTRY_DEPTH: usize = 64;

pub(crate) fn validate_description_text(value: &str) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        let mut err = ValidationError::new("description");
        err.message = Some("must be between 1 and 1000 characters".into());
        return Err(err);
    }
    Ok(())
}

fn validate_creator(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("user_id");
        err.message = Some("must not be empty".into());
        return Err(err);
    }
    Ok(())
}

/// Payload for creating a description directly
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDescriptionInput {
    #[validate(custom = "validate_description_text")]
    pub description: String,
    #[validate(custom = "validate_object_id")]
    pub category_id: String,
    #[validate(custom = "validate_object_id")]
    pub parent_id: Option<String>,
    /// Creator identifier
    #[validate(custom = "validate_creator")]
    pub user_id: String,
    pub status: Option<RecordStatus>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

/// Partial description fields; only provided fields are written
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionChanges {
    #[validate(custom = "validate_description_text")]
    pub description: Option<String>,
    #[validate(custom = "validate_object_id")]
    pub category_id: Option<String>,
    #[validate(custom = "validate_object_id")]
    pub parent_id: Option<String>,
    /// Creator identifier; only used when the changes create a description
    #[validate(custom = "validate_creator")]
    pub user_id: Option<String>,
    pub status: Option<RecordStatus>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

impl TryFrom<DescriptionChanges> for CreateDescriptionInput {
    type Error = ServiceError;

    fn try_from(changes: DescriptionChanges) -> Result<Self, Self::Error> {
        let missing: Vec<&str> = [
            ("description", changes.description.is_none()),
            ("categoryId", changes.category_id.is_none()),
            ("userId", changes.user_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect();

        match (changes.description, changes.category_id, changes.user_id) {
            (Some(description), Some(category_id), Some(user_id)) => Ok(Self {
                description,
                category_id,
                parent_id: changes.parent_id,
                user_id,
                status: changes.status,
                metadata: changes.metadata,
            }),
            _ => Err(ServiceError::ValidationError(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Listing filter; both ids must be 24-hex when present
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DescriptionFilter {
    /// Only descriptions in this category
    pub category: Option<String>,
    /// Only direct children of this description
    pub parent: Option<String>,
}

/// A description with its category and direct children resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionView {
    #[serde(flatten)]
    pub record: description::Model,
    pub category: Option<category::Model>,
    pub children: Vec<description::Model>,
}

pub(crate) async fn find_description<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<description::Model, ServiceError> {
    description::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Description"))
}

pub(crate) async fn ensure_category_exists<C: ConnectionTrait>(
    conn: &C,
    category_id: &str,
) -> Result<category::Model, ServiceError> {
    category::Entity::find_by_id(category_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ValidationError("Category not found".to_string()))
}

/// Checks that `parent_id` exists and that making it the parent of `child_id`
/// (when the child already exists) does not close a loop.
pub(crate) async fn ensure_valid_parent<C: ConnectionTrait>(
    conn: &C,
    parent_id: &str,
    child_id: Option<&str>,
) -> Result<(), ServiceError> {
    if child_id == Some(parent_id) {
        return Err(ServiceError::ValidationError(
            "A description cannot be its own parent".to_string(),
        ));
    }

    let parent = description::Entity::find_by_id(parent_id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::ValidationError("Parent description not found".to_string()))?;

    let Some(child_id) = child_id else {
        return Ok(());
    };

    let mut next = parent.parent_id;
    for _ in 0..MAX_ANCESTRY_DEPTH {
        let Some(ancestor_id) = next else {
            return Ok(());
        };
        if ancestor_id == child_id {
            return Err(ServiceError::ValidationError(
                "Parent would create a cycle".to_string(),
            ));
        }
        next = description::Entity::find_by_id(ancestor_id)
            .one(conn)
            .await?
            .and_then(|ancestor| ancestor.parent_id);
    }
    Err(ServiceError::ValidationError(
        "Description hierarchy is too deep".to_string(),
    ))
}

/// Case-insensitive text match within a category
pub(crate) async fn find_duplicate<C: ConnectionTrait>(
    conn: &C,
    category_id: &str,
    text: &str,
    exclude_id: Option<&str>,
) -> Result<Option<description::Model>, ServiceError> {
    let mut query = description::Entity::find()
        .filter(description::Column::CategoryId.eq(category_id))
        .filter(description::Column::DescriptionKey.eq(match_key(text)));
    if let Some(exclude_id) = exclude_id {
        query = query.filter(description::Column::Id.ne(exclude_id));
    }
    Ok(query.one(conn).await?)
}

pub(crate) fn duplicate_text() -> ServiceError {
    ServiceError::Conflict(DUPLICATE_TEXT.to_string())
}

/// Maps a unique index failure on the text key to the duplicate conflict.
fn conflict_on_duplicate(err: ServiceError) -> ServiceError {
    if err.is_unique_violation() {
        duplicate_text()
    } else {
        err
    }
}

/// Validates references and inserts. Duplicate detection is left to the caller;
/// a duplicate that slips past it surfaces as a conflict.
pub(crate) async fn insert_description<C: ConnectionTrait>(
    conn: &C,
    input: CreateDescriptionInput,
) -> Result<description::Model, ServiceError> {
    ensure_category_exists(conn, &input.category_id).await?;
    if let Some(parent_id) = input.parent_id.as_deref() {
        ensure_valid_parent(conn, parent_id, None).await?;
    }

    let now = Utc::now();
    let model = description::ActiveModel {
        id: Set(new_object_id()),
        description_key: Set(match_key(&input.description)),
        description: Set(input.description.trim().to_string()),
        category_id: Set(input.category_id),
        parent_id: Set(input.parent_id),
        created_by: Set(input.user_id.trim().to_string()),
        status: Set(input.status.unwrap_or_default()),
        metadata: Set(input.metadata.unwrap_or_default()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    model
        .insert(conn)
        .await
        .map_err(|e| conflict_on_duplicate(e.into()))
}

/// Assigns the provided fields to `existing` and saves through the cascade-aware path.
pub(crate) async fn apply_changes<C: ConnectionTrait>(
    conn: &C,
    existing: description::Model,
    changes: DescriptionChanges,
) -> Result<description::Model, ServiceError> {
    if let Some(category_id) = changes.category_id.as_deref() {
        ensure_category_exists(conn, category_id).await?;
    }
    if let Some(parent_id) = changes.parent_id.as_deref() {
        ensure_valid_parent(conn, parent_id, Some(&existing.id)).await?;
    }

    if changes.description.is_some() || changes.category_id.is_some() {
        let category_id = changes
            .category_id
            .as_deref()
            .unwrap_or(&existing.category_id);
        let text = changes
            .description
            .as_deref()
            .unwrap_or(&existing.description);
        if find_duplicate(conn, category_id, text, Some(&existing.id))
            .await?
            .is_some()
        {
            return Err(duplicate_text());
        }
    }

    let previous_status = existing.status;
    let mut active: description::ActiveModel = existing.into();
    if let Some(text) = changes.description {
        active.description = Set(text.trim().to_string());
    }
    if let Some(category_id) = changes.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(parent_id) = changes.parent_id {
        active.parent_id = Set(Some(parent_id));
    }
    if let Some(status) = changes.status {
        active.status = Set(status);
    }
    if let Some(metadata) = changes.metadata {
        active.metadata = Set(metadata);
    }

    status_cascade::save_description(conn, active, previous_status)
        .await
        .map_err(conflict_on_duplicate)
}

/// Resolves categories and direct children for a set of descriptions.
pub(crate) async fn populate<C: ConnectionTrait>(
    conn: &C,
    records: Vec<description::Model>,
) -> Result<Vec<DescriptionView>, ServiceError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut category_ids: Vec<String> = records.iter().map(|d| d.category_id.clone()).collect();
    category_ids.sort();
    category_ids.dedup();
    let categories: HashMap<String, category::Model> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|c| (c.id.clone(), c))
        .collect();

    let ids: Vec<String> = records.iter().map(|d| d.id.clone()).collect();
    let mut children: HashMap<String, Vec<description::Model>> = HashMap::new();
    for child in description::Entity::find()
        .filter(description::Column::ParentId.is_in(ids))
        .order_by_asc(description::Column::Description)
        .all(conn)
        .await?
    {
        if let Some(parent_id) = child.parent_id.clone() {
            children.entry(parent_id).or_default().push(child);
        }
    }

    Ok(records
        .into_iter()
        .map(|record| DescriptionView {
            category: categories.get(&record.category_id).cloned(),
            children: children.remove(&record.id).unwrap_or_default(),
            record,
        })
        .collect())
}

pub(crate) async fn populate_one<C: ConnectionTrait>(
    conn: &C,
    record: description::Model,
) -> Result<DescriptionView, ServiceError> {
    populate(conn, vec![record])
        .await?
        .pop()
        .ok_or_else(|| ServiceError::InternalError("populate returned no rows".to_string()))
}

fn check_filter_id(value: Option<&str>, label: &str) -> Result<(), ServiceError> {
    match value {
        Some(id) if !is_object_id(id) => Err(ServiceError::ValidationError(format!(
            "Invalid {} ID",
            label
        ))),
        _ => Ok(()),
    }
}

/// Direct (non-batch) operations on descriptions
#[derive(Clone)]
pub struct DescriptionService {
    db: Arc<DatabaseConnection>,
    cache: ListingCache,
}

impl DescriptionService {
    pub fn new(db: Arc<DatabaseConnection>, cache: ListingCache) -> Self {
        Self { db, cache }
    }

    /// Active descriptions whose category is active, optionally filtered.
    #[instrument(skip(self))]
    pub async fn list(&self, filter: DescriptionFilter) -> Result<Vec<DescriptionView>, ServiceError> {
        let category = filter.category.as_deref().filter(|s| !s.is_empty());
        let parent = filter.parent.as_deref().filter(|s| !s.is_empty());
        check_filter_id(category, "category")?;
        check_filter_id(parent, "parent")?;

        let key = ListingCache::key(category, parent);
        if let Some(hit) = self.cache.get::<Vec<DescriptionView>>(&key).await {
            return Ok(hit);
        }
        let generation = self.cache.generation();

        let mut query = description::Entity::find()
            .filter(description::Column::Status.eq(RecordStatus::Active));
        if let Some(category) = category {
            query = query.filter(description::Column::CategoryId.eq(category));
        }
        if let Some(parent) = parent {
            query = query.filter(description::Column::ParentId.eq(parent));
        }
        let records = query
            .order_by_asc(description::Column::Description)
            .all(&*self.db)
            .await?;

        let views: Vec<DescriptionView> = populate(&*self.db, records)
            .await?
            .into_iter()
            .filter(|view| {
                view.category
                    .as_ref()
                    .map(|c| c.status == RecordStatus::Active)
                    .unwrap_or(false)
            })
            .collect();

        // Filter ids are caller-chosen; empty filtered listings are not kept
        if !views.is_empty() || (category.is_none() && parent.is_none()) {
            self.cache.put(&key, &views, generation).await;
        }
        Ok(views)
    }

    /// Creates a description, or returns the existing one with the same text
    /// in the same category. The flag is `true` when a row was inserted.
    #[instrument(skip(self, input), fields(category_id = %input.category_id))]
    pub async fn create(
        &self,
        input: CreateDescriptionInput,
    ) -> Result<(DescriptionView, bool), ServiceError> {
        let db = &*self.db;
        ensure_category_exists(db, &input.category_id).await?;

        if let Some(existing) =
            find_duplicate(db, &input.category_id, &input.description, None).await?
        {
            info!(description_id = %existing.id, "Description already exists");
            return Ok((populate_one(db, existing).await?, false));
        }

        let category_id = input.category_id.clone();
        let text = input.description.clone();
        let created = match insert_description(db, input).await {
            Ok(created) => created,
            // Lost a race with a concurrent create of the same text
            Err(ServiceError::Conflict(msg)) => {
                return match find_duplicate(db, &category_id, &text, None).await? {
                    Some(existing) => Ok((populate_one(db, existing).await?, false)),
                    None => Err(ServiceError::Conflict(msg)),
                };
            }
            Err(e) => return Err(e),
        };
        self.cache.invalidate_descriptions().await;
        info!(description_id = %created.id, "Created description");
        Ok((populate_one(db, created).await?, true))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<DescriptionView, ServiceError> {
        let db = &*self.db;
        let record = find_description(db, id).await?;
        populate_one(db, record).await
    }

    /// Partial update; deactivation cascades to direct children.
    #[instrument(skip(self, changes))]
    pub async fn update(
        &self,
        id: &str,
        changes: DescriptionChanges,
    ) -> Result<DescriptionView, ServiceError> {
        let txn = TrackedTransaction::begin(&*self.db).await?;
        let existing = find_description(txn.conn(), id).await?;
        let updated = apply_changes(txn.conn(), existing, changes).await?;
        txn.commit().await?;

        self.cache.invalidate_descriptions().await;
        info!(description_id = %updated.id, status = %updated.status, "Updated description");
        populate_one(&*self.db, updated).await
    }

    /// Soft delete with one-level cascade.
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: &str) -> Result<DescriptionView, ServiceError> {
        let txn = TrackedTransaction::begin(&*self.db).await?;
        let existing = find_description(txn.conn(), id).await?;
        let updated = status_cascade::deactivate(txn.conn(), existing).await?;
        txn.commit().await?;

        self.cache.invalidate_descriptions().await;
        info!(description_id = %updated.id, "Deactivated description");
        populate_one(&*self.db, updated).await
    }

    /// Reactivates a description; children keep their status.
    #[instrument(skip(self))]
    pub async fn restore(&self, id: &str) -> Result<DescriptionView, ServiceError> {
        let db = &*self.db;
        let existing = find_description(db, id).await?;
        let restored = status_cascade::restore(db, existing).await?;

        self.cache.invalidate_descriptions().await;
        info!(description_id = %restored.id, "Restored description");
        populate_one(db, restored).await
    }
}
