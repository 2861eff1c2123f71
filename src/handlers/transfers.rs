use crate::{
    entities::stock_transfer,
    errors::ServiceError,
    services::transfers::{
        CreateTransferRequest, ReceiveResult, TransferFilter, TransferWithItems,
    },
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_transfer).get(list_transfers))
        .route("/:id", get(get_transfer).delete(delete_transfer))
        .route("/:id/approve", post(approve_transfer))
        .route("/:id/ship", post(ship_transfer))
        .route("/:id/receive", post(receive_transfer))
        .route("/:id/complete", post(complete_transfer))
}

/// POST /api/v1/transfers
async fn create_transfer(
    State(state): State<AppState>,
    Json(request): Json<CreateTransferRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TransferWithItems>>), ServiceError> {
    let created = state.services.transfers.create_transfer(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[derive(Debug, Deserialize)]
struct TransfersQuery {
    warehouse_id: Option<i64>,
    status: Option<String>,
    from_date: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
    #[serde(default = "super::default_page")]
    page: u64,
    #[serde(default = "super::default_limit")]
    limit: u64,
}

/// GET /api/v1/transfers
async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransfersQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<stock_transfer::Model>>>, ServiceError> {
    let filter = TransferFilter {
        warehouse_id: query.warehouse_id,
        status: query.status,
        from_date: query.from_date,
        to_date: query.to_date,
    };
    let (items, total) = state
        .services
        .transfers
        .list_transfers(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

/// GET /api/v1/transfers/{id}
async fn get_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TransferWithItems>>, ServiceError> {
    let transfer = state.services.transfers.get_transfer(id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

#[derive(Debug, Deserialize)]
struct ActorBody {
    user_id: i64,
}

/// POST /api/v1/transfers/{id}/approve
async fn approve_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<Json<ApiResponse<stock_transfer::Model>>, ServiceError> {
    let transfer = state.services.transfers.approve(id, body.user_id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// POST /api/v1/transfers/{id}/ship
async fn ship_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<Json<ApiResponse<stock_transfer::Model>>, ServiceError> {
    let transfer = state.services.transfers.ship(id, body.user_id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// POST /api/v1/transfers/{id}/receive
async fn receive_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ActorBody>,
) -> Result<Json<ApiResponse<ReceiveResult>>, ServiceError> {
    let result = state.services.transfers.receive(id, body.user_id).await?;
    Ok(Json(ApiResponse::success(result)))
}

/// POST /api/v1/transfers/{id}/complete
async fn complete_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<stock_transfer::Model>>, ServiceError> {
    let transfer = state.services.transfers.complete(id).await?;
    Ok(Json(ApiResponse::success(transfer)))
}

/// DELETE /api/v1/transfers/{id}
async fn delete_transfer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServiceError> {
    state.services.transfers.delete_transfer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
