use crate::{
    db::DbPool,
    entities::{
        parts_used::{self, Entity as PartsUsed},
        repair_parts_approval::{self, Entity as RepairPartsApproval},
        ApprovalStatus, MovementType, PartsUsedStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{alerts, movements, rollup, stock_levels},
};
use chrono::Utc;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionError, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub repair_request_id: Option<i64>,
}

/// Review workflow over gated issuances. Both decisions are terminal;
/// a second decision on the same approval fails with `AlreadyProcessed`.
#[derive(Clone)]
pub struct ApprovalService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl ApprovalService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Confirms a gated issuance: the part was already deducted at issue
    /// time, so this only flips statuses and refreshes the repair rollup.
    #[instrument(skip(self, notes))]
    pub async fn approve(
        &self,
        approval_id: i64,
        approver_id: i64,
        notes: Option<String>,
    ) -> Result<repair_parts_approval::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let approved = db
            .transaction::<_, repair_parts_approval::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (approval, part) = load_pending(txn, approval_id).await?;

                    let now = Utc::now();
                    let reason = append_note(approval.reason.clone(), notes.as_deref());

                    let mut active: repair_parts_approval::ActiveModel = approval.into();
                    active.status = Set(ApprovalStatus::Approved.as_ref().to_string());
                    active.approved_by = Set(Some(approver_id));
                    active.reviewed_at = Set(Some(now));
                    active.reason = Set(reason);
                    let approval = active.update(txn).await?;

                    let mut part_active: parts_used::ActiveModel = part.into();
                    part_active.status = Set(PartsUsedStatus::Approved.as_ref().to_string());
                    part_active.approved_by = Set(Some(approver_id));
                    part_active.approved_at = Set(Some(now));
                    part_active.updated_at = Set(now);
                    part_active.update(txn).await?;

                    rollup::recompute_repair_actual_cost(txn, approval.repair_request_id).await?;

                    info!(approval = approval.id, approver = approver_id, "approval granted");
                    Ok(approval)
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.publish_decision(&approved, true).await;
        Ok(approved)
    }

    /// Rejects a gated issuance and compensates the stock deduction made
    /// at issue time: the quantity goes back, with an `in` movement
    /// marked `approval_reversal` keeping the ledger balanced.
    #[instrument(skip(self, reason))]
    pub async fn reject(
        &self,
        approval_id: i64,
        approver_id: i64,
        reason: String,
    ) -> Result<repair_parts_approval::Model, ServiceError> {
        if reason.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "rejection reason is required".into(),
            ));
        }

        let db = self.db_pool.as_ref();

        let rejected = db
            .transaction::<_, repair_parts_approval::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let (approval, part) = load_pending(txn, approval_id).await?;

                    let now = Utc::now();
                    let merged = append_note(approval.reason.clone(), Some(reason.as_str()));

                    let mut active: repair_parts_approval::ActiveModel = approval.into();
                    active.status = Set(ApprovalStatus::Rejected.as_ref().to_string());
                    active.approved_by = Set(Some(approver_id));
                    active.reviewed_at = Set(Some(now));
                    active.reason = Set(merged);
                    let approval = active.update(txn).await?;

                    let level = stock_levels::lock_or_create_level(
                        txn,
                        part.inventory_item_id,
                        part.warehouse_id,
                    )
                    .await?;
                    let level = stock_levels::apply_delta(txn, level, part.quantity).await?;
                    alerts::reflect(txn, &level).await?;

                    movements::record_movement(
                        txn,
                        movements::NewMovement {
                            inventory_item_id: part.inventory_item_id,
                            movement_type: MovementType::In,
                            quantity: part.quantity,
                            signed_quantity: part.quantity,
                            from_warehouse_id: None,
                            to_warehouse_id: Some(part.warehouse_id),
                            reference_type: Some("approval_reversal".into()),
                            reference_id: Some(part.id),
                            created_by: Some(approver_id),
                            notes: Some(reason),
                        },
                    )
                    .await?;

                    let repair_request_id = part.repair_request_id;
                    let mut part_active: parts_used::ActiveModel = part.into();
                    part_active.status = Set(PartsUsedStatus::Cancelled.as_ref().to_string());
                    part_active.updated_at = Set(now);
                    part_active.update(txn).await?;

                    rollup::recompute_repair_actual_cost(txn, repair_request_id).await?;

                    info!(
                        approval = approval.id,
                        approver = approver_id,
                        restored_quantity = level.quantity,
                        "approval rejected, stock restored"
                    );
                    Ok(approval)
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.publish_decision(&rejected, false).await;
        Ok(rejected)
    }

    pub async fn get_approval(
        &self,
        approval_id: i64,
    ) -> Result<repair_parts_approval::Model, ServiceError> {
        let db = self.db_pool.as_ref();
        RepairPartsApproval::find_by_id(approval_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Approval {} not found", approval_id)))
    }

    /// Review queue ordered by priority rank (urgent, high, normal),
    /// then oldest requests first.
    pub async fn list_approvals(
        &self,
        filter: ApprovalFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<repair_parts_approval::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = RepairPartsApproval::find();
        if let Some(status) = filter.status {
            query = query.filter(repair_parts_approval::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(repair_parts_approval::Column::Priority.eq(priority));
        }
        if let Some(repair_id) = filter.repair_request_id {
            query = query.filter(repair_parts_approval::Column::RepairRequestId.eq(repair_id));
        }

        // Full priority rank, then oldest first: a high request always
        // outranks a normal one regardless of age.
        let priority_rank: SimpleExpr = Expr::case(
            Expr::col(repair_parts_approval::Column::Priority).eq("urgent"),
            1,
        )
        .case(
            Expr::col(repair_parts_approval::Column::Priority).eq("high"),
            2,
        )
        .case(
            Expr::col(repair_parts_approval::Column::Priority).eq("normal"),
            3,
        )
        .finally(4)
        .into();

        let paginator = query
            .order_by(priority_rank, Order::Asc)
            .order_by_asc(repair_parts_approval::Column::RequestedAt)
            .paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    async fn publish_decision(&self, approval: &repair_parts_approval::Model, approved: bool) {
        let event = Event::ApprovalDecided {
            approval_id: approval.id,
            parts_used_id: approval.parts_used_id,
            approved,
            timestamp: approval.reviewed_at.unwrap_or_else(Utc::now),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish approval decision event: {}", e);
        }
    }
}

fn map_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Loads a pending approval together with its parts_used record; any
/// non-pending status is terminal.
async fn load_pending(
    txn: &DatabaseTransaction,
    approval_id: i64,
) -> Result<(repair_parts_approval::Model, parts_used::Model), ServiceError> {
    let approval = RepairPartsApproval::find_by_id(approval_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Approval {} not found", approval_id)))?;

    if approval.status != ApprovalStatus::Pending.as_ref() {
        return Err(ServiceError::AlreadyProcessed(format!(
            "Approval {} is already {}",
            approval_id, approval.status
        )));
    }

    let part = PartsUsed::find_by_id(approval.parts_used_id)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Parts used record {} not found",
                approval.parts_used_id
            ))
        })?;

    Ok((approval, part))
}

fn append_note(existing: Option<String>, note: Option<&str>) -> Option<String> {
    match (existing, note) {
        (current, None) => current,
        (None, Some(note)) => Some(note.to_string()),
        (Some(current), Some(note)) => Some(format!("{}\n[review] {}", current, note)),
    }
}
