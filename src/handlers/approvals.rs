use crate::{
    entities::repair_parts_approval,
    errors::ServiceError,
    services::approvals::ApprovalFilter,
    ApiResponse, AppState, PaginatedResponse,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_approvals))
        .route("/:id", get(get_approval))
        .route("/:id/approve", post(approve))
        .route("/:id/reject", post(reject))
}

#[derive(Debug, Deserialize)]
struct ApprovalsQuery {
    status: Option<String>,
    priority: Option<String>,
    repair_request_id: Option<i64>,
    #[serde(default = "super::default_page")]
    page: u64,
    #[serde(default = "super::default_limit")]
    limit: u64,
}

/// GET /api/v1/approvals
async fn list_approvals(
    State(state): State<AppState>,
    Query(query): Query<ApprovalsQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<repair_parts_approval::Model>>>, ServiceError> {
    let filter = ApprovalFilter {
        status: query.status,
        priority: query.priority,
        repair_request_id: query.repair_request_id,
    };
    let (items, total) = state
        .services
        .approvals
        .list_approvals(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items,
        total,
        query.page,
        query.limit,
    ))))
}

/// GET /api/v1/approvals/{id}
async fn get_approval(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<repair_parts_approval::Model>>, ServiceError> {
    let approval = state.services.approvals.get_approval(id).await?;
    Ok(Json(ApiResponse::success(approval)))
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    approver_id: i64,
    notes: Option<String>,
}

/// POST /api/v1/approvals/{id}/approve
async fn approve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<ApiResponse<repair_parts_approval::Model>>, ServiceError> {
    let approval = state
        .services
        .approvals
        .approve(id, body.approver_id, body.notes)
        .await?;
    Ok(Json(ApiResponse::success(approval)))
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    approver_id: i64,
    reason: String,
}

/// POST /api/v1/approvals/{id}/reject
async fn reject(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RejectBody>,
) -> Result<Json<ApiResponse<repair_parts_approval::Model>>, ServiceError> {
    let approval = state
        .services
        .approvals
        .reject(id, body.approver_id, body.reason)
        .await?;
    Ok(Json(ApiResponse::success(approval)))
}
