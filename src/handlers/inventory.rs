use crate::entities::inventory_session;
use crate::errors::ServiceError;
use crate::services::inventory::{FinishSummary, SessionItemView};
use crate::{ApiResponse, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Counting session as exposed over HTTP
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDto {
    pub id: Uuid,
    pub cost_center_id: Uuid,
    pub status: String,
    pub created_by: Uuid,
    pub notes: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub precision: Option<f64>,
    pub items_count: i32,
    pub items_correct: i32,
}

impl From<inventory_session::Model> for SessionDto {
    fn from(model: inventory_session::Model) -> Self {
        Self {
            id: model.id,
            cost_center_id: model.cost_center_id,
            status: model.status,
            created_by: model.created_by,
            notes: model.notes,
            started_at: model.started_at,
            ended_at: model.ended_at,
            precision: model.precision,
            items_count: model.items_count,
            items_correct: model.items_correct,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveSessionDto {
    #[serde(flatten)]
    pub session: SessionDto,
    pub item_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShareTokenDto {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartSessionRequest {
    pub cost_center_id: Uuid,
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCountRequest {
    pub counted_quantity: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FinishSessionRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CostCenterQuery {
    pub cost_center_id: Uuid,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ItemsQuery {
    pub category_id: Option<Uuid>,
}

/// Create the inventory router
pub fn inventory_router() -> Router<AppState> {
    Router::new()
        .route("/inventory/sessions", post(start_session))
        .route("/inventory/sessions/active", get(get_active_session))
        .route("/inventory/sessions/history", get(get_history))
        .route("/inventory/sessions/:id/items", get(list_items))
        .route("/inventory/sessions/:id/share", post(get_share_token))
        .route("/inventory/sessions/:id/finish", post(finish_session))
        .route(
            "/inventory/sessions/by-token/:token",
            get(get_session_by_token),
        )
        .route("/inventory/items/:id/count", put(update_item_count))
}

/// Start a counting session for a cost center
#[utoipa::path(
    post,
    path = "/api/v1/inventory/sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 201, description = "Session started", body = SessionDto),
        (status = 409, description = "An open session already exists", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn start_session(
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state
        .inventory_service
        .start_session(
            payload.cost_center_id,
            payload.organization_id,
            payload.user_id,
            payload.notes,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(SessionDto::from(session))),
    ))
}

/// Open session for a cost center, if any
#[utoipa::path(
    get,
    path = "/api/v1/inventory/sessions/active",
    params(CostCenterQuery),
    responses(
        (status = 200, description = "Open session or null", body = ApiResponse<ActiveSessionDto>)
    ),
    tag = "inventory"
)]
pub async fn get_active_session(
    State(state): State<AppState>,
    Query(query): Query<CostCenterQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let active = state
        .inventory_service
        .get_active_session(query.cost_center_id)
        .await?;

    let dto = active.map(|(session, item_count)| ActiveSessionDto {
        session: SessionDto::from(session),
        item_count,
    });

    Ok(Json(ApiResponse::success(dto)))
}

/// Last 20 completed sessions for a cost center, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/sessions/history",
    params(CostCenterQuery),
    responses(
        (status = 200, description = "Completed sessions", body = ApiResponse<Vec<SessionDto>>)
    ),
    tag = "inventory"
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<CostCenterQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let sessions = state.inventory_service.history(query.cost_center_id).await?;
    let dtos: Vec<SessionDto> = sessions.into_iter().map(SessionDto::from).collect();

    Ok(Json(ApiResponse::success(dtos)))
}

/// Items of a session with their product projection, ordered by product name
#[utoipa::path(
    get,
    path = "/api/v1/inventory/sessions/{id}/items",
    params(
        ("id" = Uuid, Path, description = "Session id"),
        ItemsQuery
    ),
    responses(
        (status = 200, description = "Session items", body = ApiResponse<Vec<SessionItemView>>)
    ),
    tag = "inventory"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ItemsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let items = state
        .inventory_service
        .list_items(id, query.category_id)
        .await?;

    Ok(Json(ApiResponse::success(items)))
}

/// Issue (or return the existing) share token for remote counting
#[utoipa::path(
    post,
    path = "/api/v1/inventory/sessions/{id}/share",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Share token", body = ApiResponse<ShareTokenDto>),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_share_token(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = state.inventory_service.get_share_token(id).await?;

    Ok(Json(ApiResponse::success(ShareTokenDto { token })))
}

/// Resolve a share token to its session while it is still open
#[utoipa::path(
    get,
    path = "/api/v1/inventory/sessions/by-token/{token}",
    params(("token" = String, Path, description = "Share token")),
    responses(
        (status = 200, description = "Session for the token", body = ApiResponse<SessionDto>),
        (status = 410, description = "Invalid or finished link", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_session_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let session = state.inventory_service.get_session_by_token(&token).await?;

    Ok(Json(ApiResponse::success(SessionDto::from(session))))
}

/// Record a count for an item (last write wins)
#[utoipa::path(
    put,
    path = "/api/v1/inventory/items/{id}/count",
    params(("id" = Uuid, Path, description = "Session item id")),
    request_body = UpdateCountRequest,
    responses(
        (status = 200, description = "Updated item"),
        (status = 400, description = "Negative count", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session no longer open", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn update_item_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state
        .inventory_service
        .update_item_count(id, payload.counted_quantity)
        .await?;

    Ok(Json(ApiResponse::success(item)))
}

/// Finish a session: reconcile stock, write movements, update the indicator
#[utoipa::path(
    post,
    path = "/api/v1/inventory/sessions/{id}/finish",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = FinishSessionRequest,
    responses(
        (status = 200, description = "Reconciliation summary", body = ApiResponse<FinishSummary>),
        (status = 404, description = "Session not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Session not open", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn finish_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FinishSessionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let summary = state
        .inventory_service
        .finish_session(id, payload.user_id)
        .await?;

    Ok(Json(ApiResponse::success(summary)))
}
