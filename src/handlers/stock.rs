use crate::{
    entities::{stock_alert, stock_level, stock_movement, MovementType},
    errors::ServiceError,
    services::{
        alerts::AlertFilter,
        movements::MovementFilter,
        stock_levels::{AdjustStockRequest, AdjustStockResult, StockLevelFilter},
    },
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/levels", get(list_levels))
        .route("/adjust", post(adjust_stock))
        .route("/movements", get(list_movements))
        .route("/alerts", get(list_alerts))
}

// Query DTOs stay flat: axum's Query extractor does not survive
// serde(flatten) over typed fields.

#[derive(Debug, Deserialize)]
struct LevelsQuery {
    inventory_item_id: Option<i64>,
    warehouse_id: Option<i64>,
    low_stock_only: Option<bool>,
    #[serde(default = "super::default_page")]
    page: u64,
    #[serde(default = "super::default_limit")]
    limit: u64,
}

/// GET /api/v1/stock/levels
async fn list_levels(
    State(state): State<AppState>,
    Query(query): Query<LevelsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<stock_level::Model>>>, ServiceError> {
    let filter = StockLevelFilter {
        inventory_item_id: query.inventory_item_id,
        warehouse_id: query.warehouse_id,
        low_stock_only: query.low_stock_only,
    };
    let (items, total) = state
        .services
        .stock
        .list_levels(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

/// POST /api/v1/stock/adjust
async fn adjust_stock(
    State(state): State<AppState>,
    Json(request): Json<AdjustStockRequest>,
) -> Result<Json<ApiResponse<AdjustStockResult>>, ServiceError> {
    let result = state.services.stock.adjust_stock(request).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Deserialize)]
struct MovementsQuery {
    inventory_item_id: Option<i64>,
    warehouse_id: Option<i64>,
    movement_type: Option<MovementType>,
    from_date: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
    #[serde(default = "super::default_page")]
    page: u64,
    #[serde(default = "super::default_limit")]
    limit: u64,
}

/// GET /api/v1/stock/movements
async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<stock_movement::Model>>>, ServiceError> {
    let filter = MovementFilter {
        inventory_item_id: query.inventory_item_id,
        warehouse_id: query.warehouse_id,
        movement_type: query.movement_type,
        from_date: query.from_date,
        to_date: query.to_date,
    };
    let (items, total) = state
        .services
        .movements
        .list_movements(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    status: Option<String>,
    warehouse_id: Option<i64>,
    inventory_item_id: Option<i64>,
    #[serde(default = "super::default_page")]
    page: u64,
    #[serde(default = "super::default_limit")]
    limit: u64,
}

/// GET /api/v1/stock/alerts
async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<stock_alert::Model>>>, ServiceError> {
    let filter = AlertFilter {
        status: query.status,
        warehouse_id: query.warehouse_id,
        inventory_item_id: query.inventory_item_id,
    };
    let (items, total) = state
        .services
        .alerts
        .list_alerts(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}
