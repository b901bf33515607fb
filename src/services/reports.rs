use crate::{
    common::DateBounds,
    entities::{description, harvest::HarvestUnit},
    errors::ServiceError,
    object_id::is_object_id,
    services::harvests::{find_in_range, populate, HarvestView},
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Sum of amounts recorded in one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnitTotal {
    pub unit: HarvestUnit,
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total: Decimal,
    pub record_count: usize,
}

/// Harvest totals for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestReport {
    /// Every description harvested in the range, for filter pickers
    pub descriptions: Vec<description::Model>,
    /// Harvests in the range, narrowed to one description when requested
    pub harvests: Vec<HarvestView>,
    pub record_count: usize,
    /// Plain sum of all amounts regardless of unit
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub total_amount: Decimal,
    pub totals_by_unit: Vec<UnitTotal>,
}

impl HarvestReport {
    fn build(harvests: Vec<HarvestView>, description_id: Option<&str>) -> Self {
        let mut descriptions: BTreeMap<String, description::Model> = BTreeMap::new();
        for view in &harvests {
            if let Some(desc) = &view.description {
                descriptions
                    .entry(desc.record.id.clone())
                    .or_insert_with(|| desc.record.clone());
            }
        }
        let mut descriptions: Vec<description::Model> = descriptions.into_values().collect();
        descriptions.sort_by(|a, b| a.description.cmp(&b.description));

        let harvests: Vec<HarvestView> = harvests
            .into_iter()
            .filter(|h| description_id.map_or(true, |id| h.record.description_id == id))
            .collect();

        let mut by_unit: BTreeMap<HarvestUnit, (Decimal, usize)> = BTreeMap::new();
        for view in &harvests {
            let entry = by_unit.entry(view.record.unit).or_insert((Decimal::ZERO, 0));
            entry.0 += view.record.amount;
            entry.1 += 1;
        }

        Self {
            descriptions,
            record_count: harvests.len(),
            total_amount: harvests.iter().map(|h| h.record.amount).sum(),
            totals_by_unit: by_unit
                .into_iter()
                .map(|(unit, (total, record_count))| UnitTotal {
                    unit,
                    total,
                    record_count,
                })
                .collect(),
            harvests,
        }
    }
}

#[derive(Clone)]
pub struct ReportService {
    db: Arc<DatabaseConnection>,
}

impl ReportService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn harvest_report(
        &self,
        bounds: DateBounds,
        description_id: Option<&str>,
    ) -> Result<HarvestReport, ServiceError> {
        let description_id = description_id.filter(|s| !s.is_empty());
        if let Some(id) = description_id {
            if !is_object_id(id) {
                return Err(ServiceError::ValidationError(
                    "Invalid description ID".to_string(),
                ));
            }
        }

        let db = &*self.db;
        let harvests = populate(db, find_in_range(db, bounds).await?).await?;
        let report = HarvestReport::build(harvests, description_id);

        info!(
            records = report.record_count,
            total = %report.total_amount,
            "Built harvest report"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{harvest, Metadata, RecordStatus};
    use crate::services::harvests::HarvestDescription;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn desc(id: &str, text: &str) -> description::Model {
        let now = Utc::now();
        description::Model {
            id: id.into(),
            description: text.into(),
            description_key: text.to_lowercase(),
            category_id: "665f1c2a9b1e8a3d4c5f6a70".into(),
            parent_id: None,
            created_by: "u1".into(),
            status: RecordStatus::Active,
            metadata: Metadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn view(id: &str, d: &description::Model, amount: Decimal, unit: HarvestUnit) -> HarvestView {
        let now = Utc::now();
        HarvestView {
            record: harvest::Model {
                id: id.into(),
                description_id: d.id.clone(),
                amount,
                unit,
                harvest_date: now,
                status: RecordStatus::Active,
                metadata: Metadata::default(),
                created_at: now,
                updated_at: now,
            },
            description: Some(HarvestDescription {
                record: d.clone(),
                category: None,
            }),
        }
    }

    #[test]
    fn totals_are_grouped_by_unit() {
        let tomato = desc("665f1c2a9b1e8a3d4c5f6a71", "Tomato");
        let basil = desc("665f1c2a9b1e8a3d4c5f6a72", "Basil");
        let harvests = vec![
            view("665f1c2a9b1e8a3d4c5f6a81", &tomato, dec!(1.5), HarvestUnit::Kg),
            view("665f1c2a9b1e8a3d4c5f6a82", &tomato, dec!(0.25), HarvestUnit::Kg),
            view("665f1c2a9b1e8a3d4c5f6a83", &basil, dec!(3), HarvestUnit::Bunch),
        ];

        let report = HarvestReport::build(harvests, None);
        assert_eq!(report.record_count, 3);
        assert_eq!(report.total_amount, dec!(4.75));
        assert_eq!(report.totals_by_unit.len(), 2);
        assert_eq!(report.totals_by_unit[0].unit, HarvestUnit::Kg);
        assert_eq!(report.totals_by_unit[0].total, dec!(1.75));
        assert_eq!(report.totals_by_unit[0].record_count, 2);

        let names: Vec<_> = report.descriptions.iter().map(|d| d.description.as_str()).collect();
        assert_eq!(names, vec!["Basil", "Tomato"]);
    }

    #[test]
    fn description_filter_keeps_the_full_picker_list() {
        let tomato = desc("665f1c2a9b1e8a3d4c5f6a71", "Tomato");
        let basil = desc("665f1c2a9b1e8a3d4c5f6a72", "Basil");
        let harvests = vec![
            view("665f1c2a9b1e8a3d4c5f6a81", &tomato, dec!(2), HarvestUnit::Kg),
            view("665f1c2a9b1e8a3d4c5f6a83", &basil, dec!(3), HarvestUnit::Bunch),
        ];

        let report = HarvestReport::build(harvests, Some(&tomato.id));
        assert_eq!(report.record_count, 1);
        assert_eq!(report.total_amount, dec!(2));
        assert_eq!(report.descriptions.len(), 2);
    }

    #[test]
    fn empty_range_reports_zero() {
        let report = HarvestReport::build(Vec::new(), None);
        assert_eq!(report.record_count, 0);
        assert_eq!(report.total_amount, Decimal::ZERO);
        assert!(report.totals_by_unit.is_empty());
    }
}
