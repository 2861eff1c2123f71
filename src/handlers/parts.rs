use crate::{
    errors::ServiceError,
    services::issuance::{IssuanceResult, IssuePartRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/issue", post(issue_part))
}

/// POST /api/v1/parts/issue
async fn issue_part(
    State(state): State<AppState>,
    Json(request): Json<IssuePartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<IssuanceResult>>), ServiceError> {
    let result = state.services.issuance.issue_part(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(result))))
}
