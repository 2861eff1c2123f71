pub mod approvals;
pub mod parts;
pub mod stock;
pub mod transfers;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{
        issuance::ApprovalPolicy, parts_used_store, AlertService, ApprovalService,
        IssuanceService, MovementService, StockService, TransferService,
    },
};
use axum::Router;
use std::sync::Arc;

/// Service container shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub issuance: Arc<IssuanceService>,
    pub stock: Arc<StockService>,
    pub alerts: Arc<AlertService>,
    pub movements: Arc<MovementService>,
    pub transfers: Arc<TransferService>,
    pub approvals: Arc<ApprovalService>,
}

impl AppServices {
    /// Builds the full service graph, probing the parts_used schema once.
    pub async fn build(db_pool: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        let parts_store = parts_used_store::detect_store(db_pool.as_ref()).await;
        let policy = ApprovalPolicy::from(&config.approval);

        Self {
            issuance: Arc::new(IssuanceService::new(
                Arc::clone(&db_pool),
                event_sender.clone(),
                parts_store,
                policy,
            )),
            stock: Arc::new(StockService::new(
                Arc::clone(&db_pool),
                event_sender.clone(),
            )),
            alerts: Arc::new(AlertService::new(Arc::clone(&db_pool))),
            movements: Arc::new(MovementService::new(Arc::clone(&db_pool))),
            transfers: Arc::new(TransferService::new(
                Arc::clone(&db_pool),
                event_sender.clone(),
            )),
            approvals: Arc::new(ApprovalService::new(Arc::clone(&db_pool), event_sender)),
        }
    }
}

// Serde defaults shared by every list endpoint's query DTO.
pub(crate) fn default_page() -> u64 {
    1
}

pub(crate) fn default_limit() -> u64 {
    20
}

/// Assembles the `/api/v1` surface.
pub fn api_router() -> Router<crate::AppState> {
    Router::new()
        .nest("/parts", parts::router())
        .nest("/stock", stock::router())
        .nest("/transfers", transfers::router())
        .nest("/approvals", approvals::router())
}
