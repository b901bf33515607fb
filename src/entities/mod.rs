pub mod category;
pub mod description;
pub mod harvest;

use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Lifecycle status shared by categories, descriptions and harvests.
/// Records are never removed by status changes; `inactive` is the soft-deleted state.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
    #[sea_orm(string_value = "archived")]
    Archived,
}

impl RecordStatus {
    pub fn is_inactive(self) -> bool {
        self == RecordStatus::Inactive
    }
}

/// Declared type of a metadata value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetadataKind {
    String,
    Number,
    Boolean,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MetadataValue {
    #[serde(rename = "type")]
    pub kind: MetadataKind,
    pub value: String,
}

impl MetadataValue {
    /// Checks that `value` parses as the declared kind.
    pub fn check(&self) -> Result<(), String> {
        let ok = match self.kind {
            MetadataKind::String => true,
            MetadataKind::Number => self.value.trim().parse::<f64>().is_ok(),
            MetadataKind::Boolean => matches!(self.value.as_str(), "true" | "false"),
            MetadataKind::Date => {
                chrono::NaiveDate::parse_from_str(&self.value, "%Y-%m-%d").is_ok()
                    || chrono::DateTime::parse_from_rfc3339(&self.value).is_ok()
            }
        };
        if ok {
            Ok(())
        } else {
            let kind = format!("{:?}", self.kind).to_lowercase();
            Err(format!("value '{}' is not a valid {}", self.value, kind))
        }
    }
}

/// Free-form typed attributes stored as a JSON column
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Metadata(pub BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }
}

impl From<BTreeMap<String, MetadataValue>> for Metadata {
    fn from(map: BTreeMap<String, MetadataValue>) -> Self {
        Metadata(map)
    }
}

/// Lookup form of user-entered text: trimmed and lowercased over all of Unicode.
///
/// Stored next to names and descriptions so uniqueness does not depend on the
/// database's own case folding.
pub fn match_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// `validator` hook for metadata fields on request payloads
pub fn validate_metadata(metadata: &Metadata) -> Result<(), validator::ValidationError> {
    for (key, value) in &metadata.0 {
        if key.trim().is_empty() {
            let mut err = validator::ValidationError::new("metadata_key");
            err.message = Some("metadata keys must not be empty".into());
            return Err(err);
        }
        if let Err(reason) = value.check() {
            let mut err = validator::ValidationError::new("metadata_value");
            err.message = Some(format!("{}: {}", key, reason).into());
            return Err(err);
        }
    }
    Ok(())
}
