use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger vocabulary shared with the surrounding stock flows. Inventory
/// reconciliation writes `Adjustment` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementType {
    Entry,
    Exit,
    Adjustment,
    Waste,
    Transfer,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entry => "entry",
            MovementType::Exit => "exit",
            MovementType::Adjustment => "adjustment",
            MovementType::Waste => "waste",
            MovementType::Transfer => "transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(MovementType::Entry),
            "exit" => Some(MovementType::Exit),
            "adjustment" => Some(MovementType::Adjustment),
            "waste" => Some(MovementType::Waste),
            "transfer" => Some(MovementType::Transfer),
            _ => None,
        }
    }
}

/// Source document kinds a movement can point back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceType {
    Inventory,
    Purchase,
    Sale,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::Inventory => "inventory",
            ReferenceType::Purchase => "purchase",
            ReferenceType::Sale => "sale",
        }
    }
}

/// Append-only stock ledger entry. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// Storing as string in DB, converted through `MovementType`
    pub movement_type: String,
    /// Absolute quantity moved
    pub quantity: Decimal,
    pub unit: String,
    /// quantity x cost-per-unit snapshot
    pub total_cost: Decimal,
    pub stock_before: Decimal,
    pub stock_after: Decimal,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
