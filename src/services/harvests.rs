use crate::{
    common::{parse_harvest_date, DateBounds},
    entities::{
        category, description,
        harvest::{self, HarvestUnit},
        validate_metadata, Metadata, RecordStatus,
    },
    errors::ServiceError,
    object_id::{new_object_id, validate_object_id},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        let mut err = ValidationError::new("amount");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn validate_date(value: &str) -> Result<(), ValidationError> {
    parse_harvest_date(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("harvest_date");
        err.message = Some("must be YYYY-MM-DD or an RFC 3339 timestamp".into());
        err
    })
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHarvestInput {
    #[validate(custom = "validate_object_id")]
    pub description_id: String,
    #[validate(custom = "validate_amount")]
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub unit: HarvestUnit,
    /// Defaults to now
    #[validate(custom = "validate_date")]
    pub harvest_date: Option<String>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHarvestInput {
    #[validate(custom = "validate_object_id")]
    pub description_id: Option<String>,
    #[validate(custom = "validate_amount")]
    #[serde(default, with = "rust_decimal::serde::float_option")]
    #[schema(value_type = Option<f64>)]
    pub amount: Option<Decimal>,
    pub unit: Option<HarvestUnit>,
    #[validate(custom = "validate_date")]
    pub harvest_date: Option<String>,
    pub status: Option<RecordStatus>,
    #[validate(custom = "validate_metadata")]
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<Metadata>,
}

/// The description a harvest belongs to, with its category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestDescription {
    #[serde(flatten)]
    pub record: description::Model,
    pub category: Option<category::Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestView {
    #[serde(flatten)]
    pub record: harvest::Model,
    pub description: Option<HarvestDescription>,
}

async fn find_harvest<C: ConnectionTrait>(
    conn: &C,
    id: &str,
) -> Result<harvest::Model, ServiceError> {
    harvest::Entity::find_by_id(id.to_string())
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Harvest"))
}

async fn ensure_description_exists<C: ConnectionTrait>(
    conn: &C,
    description_id: &str,
) -> Result<(), ServiceError> {
    description::Entity::find_by_id(description_id.to_string())
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| ServiceError::ValidationError("Description not found".to_string()))
}

/// Active harvests of active descriptions inside `bounds`, newest first.
pub(crate) async fn find_in_range<C: ConnectionTrait>(
    conn: &C,
    bounds: DateBounds,
) -> Result<Vec<harvest::Model>, ServiceError> {
    let mut query = harvest::Entity::find()
        .inner_join(description::Entity)
        .filter(harvest::Column::Status.eq(RecordStatus::Active))
        .filter(description::Column::Status.eq(RecordStatus::Active));
    if let Some(start) = bounds.start {
        query = query.filter(harvest::Column::HarvestDate.gte(start));
    }
    if let Some(end) = bounds.end {
        query = query.filter(harvest::Column::HarvestDate.lt(end));
    }
    Ok(query
        .order_by_desc(harvest::Column::HarvestDate)
        .order_by_desc(harvest::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Resolves descriptions and their categories for a set of harvests.
pub(crate) async fn populate<C: ConnectionTrait>(
    conn: &C,
    records: Vec<harvest::Model>,
) -> Result<Vec<HarvestView>, ServiceError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let mut description_ids: Vec<String> =
        records.iter().map(|h| h.description_id.clone()).collect();
    description_ids.sort();
    description_ids.dedup();

    let descriptions: HashMap<String, HarvestDescription> = description::Entity::find()
        .filter(description::Column::Id.is_in(description_ids))
        .find_also_related(category::Entity)
        .all(conn)
        .await?
        .into_iter()
        .map(|(record, category)| {
            (
                record.id.clone(),
                HarvestDescription { record, category },
            )
        })
        .collect();

    Ok(records
        .into_iter()
        .map(|record| HarvestView {
            description: descriptions.get(&record.description_id).cloned(),
            record,
        })
        .collect())
}

#[derive(Clone)]
pub struct HarvestService {
    db: Arc<DatabaseConnection>,
}

impl HarvestService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, bounds: DateBounds) -> Result<Vec<HarvestView>, ServiceError> {
        let db = &*self.db;
        let records = find_in_range(db, bounds).await?;
        populate(db, records).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<HarvestView, ServiceError> {
        let db = &*self.db;
        let record = find_harvest(db, id).await?;
        self.populate_one(record).await
    }

    #[instrument(skip(self, input), fields(description_id = %input.description_id))]
    pub async fn create(&self, input: CreateHarvestInput) -> Result<HarvestView, ServiceError> {
        let db = &*self.db;
        ensure_description_exists(db, &input.description_id).await?;

        let harvest_date = match input.harvest_date.as_deref() {
            Some(value) => parse_harvest_date(value)?,
            None => Utc::now(),
        };

        let now = Utc::now();
        let created = harvest::ActiveModel {
            id: Set(new_object_id()),
            description_id: Set(input.description_id),
            amount: Set(input.amount),
            unit: Set(input.unit),
            harvest_date: Set(harvest_date),
            status: Set(RecordStatus::Active),
            metadata: Set(input.metadata.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(harvest_id = %created.id, amount = %created.amount, unit = %created.unit, "Recorded harvest");
        self.populate_one(created).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: &str,
        input: UpdateHarvestInput,
    ) -> Result<HarvestView, ServiceError> {
        let db = &*self.db;
        let existing = find_harvest(db, id).await?;
        if let Some(description_id) = input.description_id.as_deref() {
            ensure_description_exists(db, description_id).await?;
        }

        let mut active: harvest::ActiveModel = existing.into();
        if let Some(description_id) = input.description_id {
            active.description_id = Set(description_id);
        }
        if let Some(amount) = input.amount {
            active.amount = Set(amount);
        }
        if let Some(unit) = input.unit {
            active.unit = Set(unit);
        }
        if let Some(value) = input.harvest_date.as_deref() {
            active.harvest_date = Set(parse_harvest_date(value)?);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(metadata) = input.metadata {
            active.metadata = Set(metadata);
        }

        let updated = active.update(db).await?;
        info!(harvest_id = %updated.id, "Updated harvest");
        self.populate_one(updated).await
    }

    /// Permanently removes a harvest record.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = find_harvest(db, id).await?;
        existing.delete(db).await?;
        info!(harvest_id = %id, "Deleted harvest");
        Ok(())
    }

    async fn populate_one(&self, record: harvest::Model) -> Result<HarvestView, ServiceError> {
        populate(&*self.db, vec![record])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("populate returned no rows".to_string()))
    }
}
