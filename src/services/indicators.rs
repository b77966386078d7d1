use crate::entities::{
    indicator::{self, Entity as Indicator, STOCK_ACCURACY_KEY},
    indicator_result,
    inventory_session::{self, Entity as InventorySession, SessionStatus},
};
use crate::errors::ServiceError;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info};
use uuid::Uuid;

/// Calendar-month window containing `now`, as a half-open interval
/// [first instant of month, first instant of next month).
pub fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    let end = if now.month() == 12 {
        Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0).unwrap()
    } else {
        Utc.with_ymd_and_hms(now.year(), now.month() + 1, 1, 0, 0, 0)
            .unwrap()
    };
    (start, end)
}

/// Looks up an indicator by its stable key
pub async fn get_indicator<C: ConnectionTrait>(
    db: &C,
    cost_center_id: Uuid,
    key: &str,
) -> Result<Option<indicator::Model>, ServiceError> {
    Indicator::find()
        .filter(indicator::Column::CostCenterId.eq(cost_center_id))
        .filter(indicator::Column::Key.eq(key))
        .one(db)
        .await
        .map_err(ServiceError::DatabaseError)
}

/// Creates the indicator if it does not exist yet; returns the existing row
/// otherwise. Provisioning helper for operators and tests; the reconciliation
/// flow itself never creates indicators.
pub async fn ensure_indicator<C: ConnectionTrait>(
    db: &C,
    cost_center_id: Uuid,
    key: &str,
    name: &str,
    target_value: f64,
) -> Result<indicator::Model, ServiceError> {
    if let Some(existing) = get_indicator(db, cost_center_id, key).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let model = indicator::ActiveModel {
        id: Set(Uuid::new_v4()),
        cost_center_id: Set(cost_center_id),
        key: Set(key.to_string()),
        name: Set(name.to_string()),
        target_value: Set(target_value),
        current_value: Set(0.0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    model.insert(db).await.map_err(ServiceError::DatabaseError)
}

/// Refreshes the rolling monthly stock-accuracy indicator for a cost center.
///
/// Averages the precision of the cost center's completed sessions whose end
/// date falls within the calendar month containing `now`. An empty result set
/// falls back to `fallback_precision` (the just-finished session's own value,
/// guarding against visibility races). Missing indicator rows are skipped
/// silently; indicator provisioning is external to this flow.
///
/// Runs on the caller's connection so a surrounding transaction stays atomic.
pub async fn update_stock_accuracy<C: ConnectionTrait>(
    db: &C,
    cost_center_id: Uuid,
    fallback_precision: f64,
    now: DateTime<Utc>,
) -> Result<Option<f64>, ServiceError> {
    let Some(ind) = get_indicator(db, cost_center_id, STOCK_ACCURACY_KEY).await? else {
        debug!(
            %cost_center_id,
            "no stock accuracy indicator provisioned, skipping update"
        );
        return Ok(None);
    };

    let (month_start, month_end) = month_window(now);

    let sessions = InventorySession::find()
        .filter(inventory_session::Column::CostCenterId.eq(cost_center_id))
        .filter(inventory_session::Column::Status.eq(SessionStatus::Completed.as_str()))
        .filter(inventory_session::Column::EndedAt.gte(month_start))
        .filter(inventory_session::Column::EndedAt.lt(month_end))
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let precisions: Vec<f64> = sessions.iter().filter_map(|s| s.precision).collect();

    let avg_precision = if precisions.is_empty() {
        fallback_precision
    } else {
        precisions.iter().sum::<f64>() / precisions.len() as f64
    };

    let result = indicator_result::ActiveModel {
        id: Set(Uuid::new_v4()),
        indicator_id: Set(ind.id),
        value: Set(avg_precision),
        target_snapshot: Set(ind.target_value),
        date: Set(now),
    };
    result.insert(db).await.map_err(ServiceError::DatabaseError)?;

    let mut active: indicator::ActiveModel = ind.into();
    active.current_value = Set(avg_precision);
    active.updated_at = Set(now);
    active.update(db).await.map_err(ServiceError::DatabaseError)?;

    info!(
        %cost_center_id,
        avg_precision,
        sessions_in_month = precisions.len(),
        "stock accuracy indicator updated"
    );

    Ok(Some(avg_precision))
}
