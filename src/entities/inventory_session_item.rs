use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One product snapshot inside a counting session.
///
/// Product name, category, unit and cost are denormalized at session start so
/// later catalog edits cannot corrupt the audit trail. `counted_quantity`
/// stays null until someone submits a count; after that `difference` is
/// exactly `counted_quantity - expected_quantity` and `is_correct` holds iff
/// the absolute difference is strictly below the counting tolerance.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_session_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub session_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub unit: String,
    /// Cost per base unit at snapshot time (0 when the product has no avg cost)
    pub cost_per_unit: Decimal,
    /// Product stock at snapshot time
    pub expected_quantity: Decimal,
    pub counted_quantity: Option<Decimal>,
    pub difference: Decimal,
    pub is_correct: bool,
    pub counted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_session::Entity",
        from = "Column::SessionId",
        to = "super::inventory_session::Column::Id"
    )]
    Session,
}

impl Related<super::inventory_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
