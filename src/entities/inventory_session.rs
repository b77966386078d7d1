use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a counting session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(SessionStatus::Open),
            "completed" => Some(SessionStatus::Completed),
            "cancelled" => Some(SessionStatus::Cancelled),
            _ => None,
        }
    }
}

/// A physical inventory counting session for one cost center.
///
/// At most one session may be `open` per cost center at a time; the partial
/// unique index `ux_inventory_sessions_open_cost_center` is the authoritative
/// guard.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cost_center_id: Uuid,
    /// Storing as string in DB, converted through `SessionStatus`
    pub status: String,
    /// Bearer capability for anonymous count submission, lazily issued
    #[sea_orm(unique)]
    pub share_token: Option<String>,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Percentage of counted items within tolerance; set on completion
    pub precision: Option<f64>,
    /// Number of counted items at completion
    pub items_count: i32,
    /// Number of counted items within tolerance at completion
    pub items_correct: i32,
}

impl Model {
    pub fn status(&self) -> Option<SessionStatus> {
        SessionStatus::from_str(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open.as_str()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::inventory_session_item::Entity")]
    Items,
}

impl Related<super::inventory_session_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr> {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.started_at {
            active_model.started_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
