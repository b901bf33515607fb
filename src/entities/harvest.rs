use super::{Metadata, RecordStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One recorded harvest of a description on a given day
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "harvests")]
#[serde(rename_all = "camelCase")]
#[schema(as = Harvest)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub description_id: String,
    #[sea_orm(column_type = "Decimal(Some((14, 3)))")]
    #[serde(with = "rust_decimal::serde::float")]
    #[schema(value_type = f64)]
    pub amount: Decimal,
    pub unit: HarvestUnit,
    pub harvest_date: DateTime<Utc>,
    pub status: RecordStatus,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::description::Entity",
        from = "Column::DescriptionId",
        to = "super::description::Column::Id"
    )]
    Description,
}

impl Related<super::description::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Description.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}

/// Unit a harvest amount is measured in
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum HarvestUnit {
    #[sea_orm(string_value = "piece")]
    Piece,
    #[sea_orm(string_value = "kg")]
    Kg,
    #[sea_orm(string_value = "g")]
    G,
    #[sea_orm(string_value = "lb")]
    Lb,
    #[sea_orm(string_value = "oz")]
    Oz,
    #[sea_orm(string_value = "bunch")]
    Bunch,
}
