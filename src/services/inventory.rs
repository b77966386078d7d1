use crate::{
    db::DbPool,
    entities::{
        inventory_session::{self, Entity as InventorySession, SessionStatus},
        inventory_session_item::{self, Entity as InventorySessionItem},
        product::{self, Entity as Product},
        stock_movement::{self, MovementType, ReferenceType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::indicators,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionError, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Absolute tolerance below which a counted quantity is considered to match
/// the expected stock. Strict comparisons on both sides: a difference of
/// exactly 0.001 is incorrect, and produces no adjustment movement.
pub const COUNT_TOLERANCE: Decimal = dec!(0.001);

const DEFAULT_FINISH_TXN_TIMEOUT: Duration = Duration::from_secs(60);

/// Small product projection returned alongside each session item
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemProduct {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub image_url: Option<String>,
    pub unit: String,
}

/// Session item joined with its product projection, as listed to counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionItemView {
    pub id: Uuid,
    pub session_id: Uuid,
    pub product: ItemProduct,
    pub expected_quantity: Decimal,
    pub counted_quantity: Option<Decimal>,
    pub difference: Decimal,
    pub is_correct: bool,
    pub counted_at: Option<DateTime<Utc>>,
}

/// Outcome of `finish_session`
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinishSummary {
    /// Percentage of counted items within tolerance
    pub precision: f64,
    /// Number of items that were counted
    pub items_count: i32,
    /// Number of counted items within tolerance
    pub items_correct: i32,
    /// Stock adjustments applied (movements written)
    pub adjustments: u64,
}

/// Computes the signed difference and tolerance correctness for a count
pub fn evaluate_count(expected: Decimal, counted: Decimal) -> (Decimal, bool) {
    let difference = counted - expected;
    (difference, difference.abs() < COUNT_TOLERANCE)
}

/// Precision percentage: correct / counted * 100, or 0 when nothing was
/// counted. Uncounted items never enter the denominator.
pub fn compute_precision(correct_count: usize, counted_count: usize) -> f64 {
    if counted_count == 0 {
        return 0.0;
    }
    correct_count as f64 / counted_count as f64 * 100.0
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Service owning the inventory counting workflow: session lifecycle, count
/// collection (including anonymous share-link submissions), and the
/// reconciliation that closes a session.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    finish_txn_timeout: Duration,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            finish_txn_timeout: DEFAULT_FINISH_TXN_TIMEOUT,
        }
    }

    /// Overrides the execution budget of the reconciliation transaction
    pub fn with_finish_timeout(mut self, timeout: Duration) -> Self {
        self.finish_txn_timeout = timeout;
        self
    }

    /// Starts a counting session for a cost center and snapshots every active
    /// product of the organization into it.
    ///
    /// The pre-check below is an early exit; the authoritative single-open
    /// guard is the partial unique index on (cost_center_id) WHERE
    /// status='open', whose violation maps to the same `Conflict`.
    #[instrument(skip(self, notes))]
    pub async fn start_session(
        &self,
        cost_center_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
    ) -> Result<inventory_session::Model, ServiceError> {
        let db = self.db.as_ref();

        let existing = InventorySession::find()
            .filter(inventory_session::Column::CostCenterId.eq(cost_center_id))
            .filter(inventory_session::Column::Status.eq(SessionStatus::Open.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "an inventory session is already open for this cost center".to_string(),
            ));
        }

        let session = inventory_session::ActiveModel {
            id: Set(Uuid::new_v4()),
            cost_center_id: Set(cost_center_id),
            status: Set(SessionStatus::Open.as_str().to_string()),
            share_token: Set(None),
            created_by: Set(user_id),
            notes: Set(notes),
            started_at: Set(Utc::now()),
            ended_at: Set(None),
            precision: Set(None),
            items_count: Set(0),
            items_correct: Set(0),
        };
        let session = session.insert(db).await.map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "an inventory session is already open for this cost center".to_string(),
                )
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        let products = Product::find()
            .filter(product::Column::OrganizationId.eq(organization_id))
            .filter(product::Column::IsActive.eq(true))
            .find_also_related(crate::entities::product_category::Entity)
            .all(db)
            .await?;

        let snapshot_count = products.len() as u64;
        if !products.is_empty() {
            let items = products.into_iter().map(|(p, category)| {
                inventory_session_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    session_id: Set(session.id),
                    product_id: Set(p.id),
                    product_name: Set(p.name),
                    category_id: Set(p.category_id),
                    category_name: Set(category.map(|c| c.name)),
                    unit: Set(p.base_unit),
                    cost_per_unit: Set(p.avg_cost.unwrap_or(Decimal::ZERO)),
                    expected_quantity: Set(p.current_stock),
                    counted_quantity: Set(None),
                    difference: Set(Decimal::ZERO),
                    is_correct: Set(false),
                    counted_at: Set(None),
                }
            });
            InventorySessionItem::insert_many(items).exec(db).await?;
        }

        info!(
            session_id = %session.id,
            %cost_center_id,
            snapshot_count,
            "inventory session started"
        );

        self.event_sender
            .send(Event::InventorySessionStarted {
                session_id: session.id,
                cost_center_id,
                items_snapshotted: snapshot_count,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(session)
    }

    /// Returns the open session for a cost center (with its item count), or
    /// None when there is nothing to continue.
    #[instrument(skip(self))]
    pub async fn get_active_session(
        &self,
        cost_center_id: Uuid,
    ) -> Result<Option<(inventory_session::Model, u64)>, ServiceError> {
        let db = self.db.as_ref();

        let Some(session) = InventorySession::find()
            .filter(inventory_session::Column::CostCenterId.eq(cost_center_id))
            .filter(inventory_session::Column::Status.eq(SessionStatus::Open.as_str()))
            .one(db)
            .await?
        else {
            return Ok(None);
        };

        let item_count = InventorySessionItem::find()
            .filter(inventory_session_item::Column::SessionId.eq(session.id))
            .count(db)
            .await?;

        Ok(Some((session, item_count)))
    }

    /// Returns the session's share token, generating and persisting one on
    /// first use. Idempotent: an existing token is returned unchanged.
    ///
    /// The token is a bearer capability scoped to exactly this session; any
    /// holder can submit counts without authentication while the session is
    /// open.
    #[instrument(skip(self))]
    pub async fn get_share_token(&self, session_id: Uuid) -> Result<String, ServiceError> {
        let db = self.db.as_ref();

        let session = InventorySession::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("inventory session not found".to_string()))?;

        if let Some(token) = session.share_token.clone() {
            return Ok(token);
        }

        let token = Uuid::new_v4().simple().to_string();
        let mut active: inventory_session::ActiveModel = session.into();
        active.share_token = Set(Some(token.clone()));
        active.update(db).await?;

        Ok(token)
    }

    /// Resolves a share token to its session. Fails closed: a token pointing
    /// at a missing session and a token whose session is no longer open are
    /// deliberately indistinguishable.
    #[instrument(skip(self, token))]
    pub async fn get_session_by_token(
        &self,
        token: &str,
    ) -> Result<inventory_session::Model, ServiceError> {
        let db = self.db.as_ref();

        let session = InventorySession::find()
            .filter(inventory_session::Column::ShareToken.eq(token))
            .one(db)
            .await?;

        match session {
            Some(s) if s.is_open() => Ok(s),
            _ => Err(ServiceError::InvalidLink(
                "invalid or finished inventory link".to_string(),
            )),
        }
    }

    /// Lists a session's items, optionally filtered to one category, ordered
    /// by product name for counters working through the list.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        session_id: Uuid,
        category_id: Option<Uuid>,
    ) -> Result<Vec<SessionItemView>, ServiceError> {
        let db = self.db.as_ref();

        let mut query = InventorySessionItem::find()
            .filter(inventory_session_item::Column::SessionId.eq(session_id));
        if let Some(category) = category_id {
            query = query.filter(inventory_session_item::Column::CategoryId.eq(category));
        }
        let items = query
            .order_by_asc(inventory_session_item::Column::ProductName)
            .all(db)
            .await?;

        // Image URLs live on the catalog row, not in the snapshot
        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let images: HashMap<Uuid, Option<String>> = Product::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.image_url))
            .collect();

        Ok(items
            .into_iter()
            .map(|item| SessionItemView {
                id: item.id,
                session_id: item.session_id,
                product: ItemProduct {
                    id: item.product_id,
                    name: item.product_name,
                    category_id: item.category_id,
                    category_name: item.category_name,
                    image_url: images.get(&item.product_id).cloned().flatten(),
                    unit: item.unit,
                },
                expected_quantity: item.expected_quantity,
                counted_quantity: item.counted_quantity,
                difference: item.difference,
                is_correct: item.is_correct,
                counted_at: item.counted_at,
            })
            .collect())
    }

    /// Records a count for an item. Repeated submissions overwrite each other
    /// (last write wins); no history of earlier counts is kept. Items become
    /// read-only once their session completes.
    #[instrument(skip(self))]
    pub async fn update_item_count(
        &self,
        item_id: Uuid,
        counted_quantity: Decimal,
    ) -> Result<inventory_session_item::Model, ServiceError> {
        if counted_quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "counted quantity cannot be negative".to_string(),
            ));
        }

        let db = self.db.as_ref();

        let item = InventorySessionItem::find_by_id(item_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("inventory item not found".to_string()))?;

        let session = InventorySession::find_by_id(item.session_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("inventory session not found".to_string()))?;
        if !session.is_open() {
            return Err(ServiceError::InvalidState(
                "inventory session is no longer open".to_string(),
            ));
        }

        let (difference, is_correct) = evaluate_count(item.expected_quantity, counted_quantity);
        let session_id = item.session_id;

        let mut active: inventory_session_item::ActiveModel = item.into();
        active.counted_quantity = Set(Some(counted_quantity));
        active.difference = Set(difference);
        active.is_correct = Set(is_correct);
        active.counted_at = Set(Some(Utc::now()));
        let updated = active.update(db).await?;

        self.event_sender
            .send(Event::InventoryCountRecorded {
                session_id,
                item_id: updated.id,
                counted_quantity,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(updated)
    }

    /// Closes a session: computes precision over the counted items, then in
    /// one transaction applies stock corrections for every discrepancy beyond
    /// tolerance, writes the matching adjustment movements, marks the session
    /// completed and refreshes the monthly stock-accuracy indicator. Any
    /// failure rolls the whole phase back, leaving the session open.
    ///
    /// Stock corrections are snapshot-wins overwrites: the counted quantity
    /// replaces whatever the live stock drifted to during the counting
    /// window. Concurrent stock writers racing this transaction can have
    /// their effect erased; physical-count reconciliation semantics.
    #[instrument(skip(self))]
    pub async fn finish_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
    ) -> Result<FinishSummary, ServiceError> {
        let db = self.db.as_ref();

        let session = InventorySession::find_by_id(session_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("inventory session not found".to_string()))?;
        if !session.is_open() {
            return Err(ServiceError::InvalidState(
                "inventory session already finished or cancelled".to_string(),
            ));
        }

        let items = InventorySessionItem::find()
            .filter(inventory_session_item::Column::SessionId.eq(session_id))
            .all(db)
            .await?;

        let counted_items: Vec<&inventory_session_item::Model> = items
            .iter()
            .filter(|i| i.counted_quantity.is_some())
            .collect();
        let counted_count = counted_items.len();
        let correct_count = counted_items.iter().filter(|i| i.is_correct).count();
        let precision = compute_precision(correct_count, counted_count);

        let cost_center_id = session.cost_center_id;
        let adjustable: Vec<inventory_session_item::Model> = counted_items
            .into_iter()
            .filter(|i| i.difference.abs() > COUNT_TOLERANCE)
            .cloned()
            .collect();

        let txn_future = db.transaction::<_, u64, ServiceError>(move |txn| {
            Box::pin(async move {
                // Re-check under the transaction; the pre-check above is
                // vulnerable to a concurrent finish of the same session.
                let session = InventorySession::find_by_id(session_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound("inventory session not found".to_string())
                    })?;
                if !session.is_open() {
                    return Err(ServiceError::InvalidState(
                        "inventory session already finished or cancelled".to_string(),
                    ));
                }

                let now = Utc::now();
                let mut adjustments = 0u64;

                for item in &adjustable {
                    let Some(counted) = item.counted_quantity else {
                        continue;
                    };

                    Product::update_many()
                        .col_expr(product::Column::CurrentStock, Expr::value(counted))
                        .col_expr(product::Column::UpdatedAt, Expr::value(now))
                        .filter(product::Column::Id.eq(item.product_id))
                        .exec(txn)
                        .await?;

                    let movement = stock_movement::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(item.product_id),
                        movement_type: Set(MovementType::Adjustment.as_str().to_string()),
                        quantity: Set(item.difference.abs()),
                        unit: Set(item.unit.clone()),
                        total_cost: Set(item.difference.abs() * item.cost_per_unit),
                        stock_before: Set(item.expected_quantity),
                        stock_after: Set(counted),
                        reference_type: Set(Some(ReferenceType::Inventory.as_str().to_string())),
                        reference_id: Set(Some(session_id)),
                        created_by: Set(user_id),
                        notes: Set(Some(format!(
                            "Inventory count adjustment for {} (difference: {} {})",
                            item.product_name, item.difference, item.unit
                        ))),
                        created_at: Set(now),
                    };
                    movement.insert(txn).await?;

                    adjustments += 1;
                }

                let mut active: inventory_session::ActiveModel = session.into();
                active.status = Set(SessionStatus::Completed.as_str().to_string());
                active.ended_at = Set(Some(now));
                active.precision = Set(Some(precision));
                active.items_count = Set(counted_count as i32);
                active.items_correct = Set(correct_count as i32);
                active.update(txn).await?;

                indicators::update_stock_accuracy(txn, cost_center_id, precision, now).await?;

                Ok(adjustments)
            })
        });

        let adjustments = tokio::time::timeout(self.finish_txn_timeout, txn_future)
            .await
            .map_err(|_| {
                warn!(%session_id, "reconciliation transaction exceeded its execution budget");
                ServiceError::InternalError(
                    "reconciliation transaction exceeded its execution budget".to_string(),
                )
            })?
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        info!(
            %session_id,
            %cost_center_id,
            precision,
            items_count = counted_count,
            adjustments,
            "inventory session completed"
        );

        // The reconciliation is durable at this point; a listener outage must
        // not turn a committed finish into an error for the caller.
        if let Err(e) = self
            .event_sender
            .send(Event::InventorySessionCompleted {
                session_id,
                cost_center_id,
                precision,
                adjustments,
            })
            .await
        {
            warn!(%session_id, error = %e, "failed to publish session completed event");
        }

        Ok(FinishSummary {
            precision,
            items_count: counted_count as i32,
            items_correct: correct_count as i32,
            adjustments,
        })
    }

    /// Last 20 completed sessions for a cost center, newest first
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        cost_center_id: Uuid,
    ) -> Result<Vec<inventory_session::Model>, ServiceError> {
        let db = self.db.as_ref();

        let sessions = InventorySession::find()
            .filter(inventory_session::Column::CostCenterId.eq(cost_center_id))
            .filter(inventory_session::Column::Status.eq(SessionStatus::Completed.as_str()))
            .order_by_desc(inventory_session::Column::EndedAt)
            .limit(20)
            .all(db)
            .await?;

        Ok(sessions)
    }
}
