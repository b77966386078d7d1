use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable key of the stock accuracy indicator maintained by reconciliation
pub const STOCK_ACCURACY_KEY: &str = "stock_accuracy";

/// KPI definition scoped to one cost center. Looked up by (cost_center_id,
/// key); `name` is a display label only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "indicators")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cost_center_id: Uuid,
    pub key: String,
    pub name: String,
    pub target_value: f64,
    pub current_value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::indicator_result::Entity")]
    Results,
}

impl Related<super::indicator_result::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Results.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
