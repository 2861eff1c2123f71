use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set};
use std::sync::Arc;
use stockroom_api::{
    db::{establish_connection, run_migrations, DbPool},
    entities::{
        inventory_item, parts_used,
        repair_parts_approval::{self, Entity as RepairPartsApproval},
        repair_request::{self, Entity as RepairRequest},
        stock_level::{self, Entity as StockLevel},
        stock_movement::{self, Entity as StockMovement},
        warehouse,
    },
    errors::ServiceError,
    events::EventSender,
    services::{
        approvals::{ApprovalFilter, ApprovalService},
        issuance::{ApprovalPolicy, IssuanceService, IssuePartRequest},
        parts_used_store::EnhancedPartsUsedStore,
    },
};
use tokio::sync::mpsc;

async fn setup_db(name: &str) -> Arc<DbPool> {
    let url = format!("sqlite:file:{}?mode=memory&cache=shared", name);
    let db = Arc::new(
        establish_connection(&url)
            .await
            .expect("failed to connect test database"),
    );
    run_migrations(db.as_ref())
        .await
        .expect("failed to run migrations");
    db
}

fn services(db: &Arc<DbPool>) -> (IssuanceService, ApprovalService) {
    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(async move {
        let mut rx = rx;
        while rx.recv().await.is_some() {}
    });
    let sender = EventSender::new(tx);
    (
        IssuanceService::new(
            Arc::clone(db),
            sender.clone(),
            Arc::new(EnhancedPartsUsedStore),
            ApprovalPolicy::default(),
        ),
        ApprovalService::new(Arc::clone(db), sender),
    )
}

/// Seeds an item at 100 units and issues a gated quantity; returns the
/// pending approval id and the parts_used id.
async fn issue_gated(db: &Arc<DbPool>, issuance: &IssuanceService) -> (i64, i64, i64) {
    let item = inventory_item::ActiveModel {
        id: NotSet,
        name: Set("Compressor".into()),
        sku: Set("CMP-900".into()),
        purchase_price: Set(dec!(10)),
        selling_price: Set(dec!(15)),
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db.as_ref())
    .await
    .expect("item insert failed");

    let wh = warehouse::ActiveModel {
        id: NotSet,
        name: Set("Main".into()),
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
    }
    .insert(db.as_ref())
    .await
    .expect("warehouse insert failed");

    let repair = repair_request::ActiveModel {
        id: NotSet,
        actual_cost: NotSet,
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db.as_ref())
    .await
    .expect("repair insert failed");

    stock_level::ActiveModel {
        id: NotSet,
        inventory_item_id: Set(item.id),
        warehouse_id: Set(wh.id),
        quantity: Set(100),
        min_level: Set(5),
        is_low_stock: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db.as_ref())
    .await
    .expect("level insert failed");

    // 60 x 10 = 600 > 500: gated at normal priority.
    let result = issuance
        .issue_part(IssuePartRequest {
            repair_request_id: repair.id,
            inventory_item_id: item.id,
            warehouse_id: wh.id,
            quantity: 60,
            requested_by: Some(7),
            invoice_id: None,
            invoice_item_id: None,
            serial_number: None,
            notes: Some("compressor swap".into()),
        })
        .await
        .expect("issue failed");

    assert!(result.approval_required);
    assert_eq!(result.stock_level.quantity, 40);
    (
        result.approval_id.expect("approval id"),
        result.parts_used_id,
        repair.id,
    )
}

#[tokio::test]
async fn approve_flips_statuses_and_counts_cost() {
    let db = setup_db("approval_grant").await;
    let (issuance, approvals) = services(&db);
    let (approval_id, parts_used_id, repair_id) = issue_gated(&db, &issuance).await;

    let approved = approvals
        .approve(approval_id, 42, Some("verified with customer".into()))
        .await
        .expect("approve failed");

    assert_eq!(approved.status, "approved");
    assert_eq!(approved.approved_by, Some(42));
    assert!(approved.reviewed_at.is_some());
    assert!(approved
        .reason
        .as_deref()
        .expect("reason")
        .contains("verified with customer"));

    let part = parts_used::Entity::find_by_id(parts_used_id)
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("part missing");
    assert_eq!(part.status, "approved");
    assert_eq!(part.approved_by, Some(42));

    // Approved parts now count toward the repair cost.
    let repair = RepairRequest::find_by_id(repair_id)
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("repair missing");
    assert_eq!(repair.actual_cost, Some(dec!(600)));

    // The decision is terminal.
    let err = approvals
        .approve(approval_id, 42, None)
        .await
        .expect_err("expected terminal guard");
    assert_matches!(err, ServiceError::AlreadyProcessed(_));
}

#[tokio::test]
async fn reject_restores_stock_with_compensating_movement() {
    let db = setup_db("approval_reject").await;
    let (issuance, approvals) = services(&db);
    let (approval_id, parts_used_id, repair_id) = issue_gated(&db, &issuance).await;

    let rejected = approvals
        .reject(approval_id, 42, "too expensive for this job".into())
        .await
        .expect("reject failed");
    assert_eq!(rejected.status, "rejected");

    let part = parts_used::Entity::find_by_id(parts_used_id)
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("part missing");
    assert_eq!(part.status, "cancelled");

    // Stock back to its pre-issuance quantity.
    let level = StockLevel::find()
        .filter(stock_level::Column::InventoryItemId.eq(part.inventory_item_id))
        .filter(stock_level::Column::WarehouseId.eq(part.warehouse_id))
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("level missing");
    assert_eq!(level.quantity, 100);
    assert!(!level.is_low_stock);

    // Ledger stays append-only: the original out plus one compensating in.
    let movements = StockMovement::find()
        .filter(stock_movement::Column::InventoryItemId.eq(part.inventory_item_id))
        .all(db.as_ref())
        .await
        .expect("query failed");
    assert_eq!(movements.len(), 2);
    let reversal = movements
        .iter()
        .find(|m| m.reference_type.as_deref() == Some("approval_reversal"))
        .expect("reversal movement missing");
    assert_eq!(reversal.movement_type, "in");
    assert_eq!(reversal.signed_quantity, 60);
    assert_eq!(reversal.reference_id, Some(parts_used_id));

    // Cancelled parts no longer count toward the repair.
    let repair = RepairRequest::find_by_id(repair_id)
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("repair missing");
    assert_eq!(repair.actual_cost, Some(dec!(0)));

    let err = approvals
        .reject(approval_id, 42, "again".into())
        .await
        .expect_err("expected terminal guard");
    assert_matches!(err, ServiceError::AlreadyProcessed(_));
}

#[tokio::test]
async fn review_queue_orders_by_priority_then_oldest() {
    let db = setup_db("approval_ordering").await;
    let (_, approvals) = services(&db);

    // The normal request is the oldest and the urgent one the newest;
    // priority must still outrank age.
    let base = Utc::now();
    for (idx, (priority, minutes_ago)) in [("normal", 90), ("high", 30), ("urgent", 5), ("high", 60)]
        .into_iter()
        .enumerate()
    {
        repair_parts_approval::ActiveModel {
            id: NotSet,
            parts_used_id: Set(idx as i64 + 1),
            repair_request_id: Set(1),
            status: Set("pending".into()),
            priority: Set(priority.to_string()),
            total_cost: Set(dec!(700)),
            approver_role: Set("supervisor".into()),
            requested_by: Set(Some(1)),
            approved_by: NotSet,
            reason: NotSet,
            requested_at: Set(base - chrono::Duration::minutes(minutes_ago)),
            reviewed_at: NotSet,
        }
        .insert(db.as_ref())
        .await
        .expect("approval insert failed");
    }

    let (items, total) = approvals
        .list_approvals(ApprovalFilter::default(), 1, 10)
        .await
        .expect("list failed");
    assert_eq!(total, 4);
    let priorities: Vec<&str> = items.iter().map(|a| a.priority.as_str()).collect();
    assert_eq!(priorities, ["urgent", "high", "high", "normal"]);
    // Within the same priority, oldest first.
    assert!(items[1].requested_at <= items[2].requested_at);

    let (pending_urgent, _) = approvals
        .list_approvals(
            ApprovalFilter {
                status: Some("pending".into()),
                priority: Some("urgent".into()),
                repair_request_id: None,
            },
            1,
            10,
        )
        .await
        .expect("filtered list failed");
    assert_eq!(pending_urgent.len(), 1);

    let queue = RepairPartsApproval::find()
        .filter(repair_parts_approval::Column::Status.eq("pending"))
        .all(db.as_ref())
        .await
        .expect("query failed");
    assert_eq!(queue.len(), 4);
}
