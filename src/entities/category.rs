use super::{match_key, Metadata, RecordStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{entity::prelude::*, ActiveValue, ActiveValue::Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Top-level grouping of descriptions ("Tomatoes", "Herbs")
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "categories")]
#[serde(rename_all = "camelCase")]
#[schema(as = Category)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// Unique lookup form of `name`
    #[serde(skip)]
    pub name_key: String,
    pub description: Option<String>,
    pub status: RecordStatus,
    pub order: i32,
    #[sea_orm(column_type = "Json")]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::description::Entity")]
    Descriptions,
}

impl Related<super::description::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Descriptions.def()
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
        if let ActiveValue::Set(text) = &active_model.name {
            active_model.name_key = Set(match_key(text));
        }

        Ok(active_model)
    }
}
