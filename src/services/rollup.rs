use crate::{
    entities::{
        parts_used::{self, Entity as PartsUsed},
        repair_request::{self, Entity as RepairRequest},
        repair_request_service::{self, Entity as RepairRequestService},
    },
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set};

/// Part statuses whose cost counts toward the repair total. `reserved`
/// survives from pre-approval-gate data and still represents committed
/// stock.
const COUNTED_PART_STATUSES: [&str; 3] = ["used", "approved", "reserved"];

/// Recomputes and persists a repair's actual cost from its consumed parts
/// and completed services. Called inside the issuance and approval
/// transactions so the rollup can never lag a committed part change.
pub(crate) async fn recompute_repair_actual_cost(
    txn: &DatabaseTransaction,
    repair_request_id: i64,
) -> Result<Decimal, ServiceError> {
    let repair = RepairRequest::find_by_id(repair_request_id)
        .one(txn)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Repair request {} not found", repair_request_id))
        })?;

    let parts = PartsUsed::find()
        .filter(parts_used::Column::RepairRequestId.eq(repair_request_id))
        .filter(parts_used::Column::Status.is_in(COUNTED_PART_STATUSES))
        .all(txn)
        .await?;
    let parts_cost: Decimal = parts.iter().map(|p| p.total_cost).sum();

    let services = RepairRequestService::find()
        .filter(repair_request_service::Column::RepairRequestId.eq(repair_request_id))
        .filter(repair_request_service::Column::Status.eq("completed"))
        .all(txn)
        .await?;
    let services_cost: Decimal = services.iter().map(|s| s.price).sum();

    let total = parts_cost + services_cost;

    let mut active: repair_request::ActiveModel = repair.into();
    active.actual_cost = Set(Some(total));
    active.updated_at = Set(Utc::now());
    active.update(txn).await?;

    Ok(total)
}
