use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set};
use std::sync::Arc;
use stockroom_api::{
    db::{establish_connection, run_migrations, DbPool},
    entities::{
        inventory_item, repair_request,
        stock_alert::{self, Entity as StockAlert},
        stock_level::{self, Entity as StockLevel},
        stock_movement::{self, Entity as StockMovement},
        warehouse,
    },
    errors::ServiceError,
    events::EventSender,
    services::{
        issuance::{ApprovalPolicy, IssuanceService, IssuePartRequest},
        parts_used_store::EnhancedPartsUsedStore,
        stock_levels::{AdjustStockRequest, StockService},
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

fn issuance_service(db: &Arc<DbPool>) -> (IssuanceService, mpsc::Receiver<stockroom_api::events::Event>) {
    let (tx, rx) = mpsc::channel(100);
    let service = IssuanceService::new(
        Arc::clone(db),
        EventSender::new(tx),
        Arc::new(EnhancedPartsUsedStore),
        ApprovalPolicy::default(),
    );
    (service, rx)
}

async fn create_item(db: &DbPool, sku: &str, purchase: rust_decimal::Decimal, selling: rust_decimal::Decimal) -> inventory_item::Model {
    inventory_item::ActiveModel {
        id: NotSet,
        name: Set(format!("Part {}", sku)),
        sku: Set(sku.to_string()),
        purchase_price: Set(purchase),
        selling_price: Set(selling),
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to insert item")
}

async fn create_warehouse(db: &DbPool, name: &str) -> warehouse::Model {
    warehouse::ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to insert warehouse")
}

async fn create_repair(db: &DbPool) -> repair_request::Model {
    repair_request::ActiveModel {
        id: NotSet,
        actual_cost: NotSet,
        deleted_at: NotSet,
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to insert repair request")
}

async fn seed_level(
    db: &DbPool,
    item_id: i64,
    warehouse_id: i64,
    quantity: i32,
    min_level: i32,
) -> stock_level::Model {
    stock_level::ActiveModel {
        id: NotSet,
        inventory_item_id: Set(item_id),
        warehouse_id: Set(warehouse_id),
        quantity: Set(quantity),
        min_level: Set(min_level),
        is_low_stock: Set(quantity <= min_level),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("failed to seed stock level")
}

fn issue_request(repair: i64, item: i64, warehouse: i64, quantity: i32) -> IssuePartRequest {
    IssuePartRequest {
        repair_request_id: repair,
        inventory_item_id: item,
        warehouse_id: warehouse,
        quantity,
        requested_by: Some(7),
        invoice_id: None,
        invoice_item_id: None,
        serial_number: None,
        notes: None,
    }
}

#[tokio::test]
async fn issue_decrements_stock_and_records_ledger() {
    let db = setup_db("issue_basic").await;
    let (service, _rx) = issuance_service(&db);

    let item = create_item(&db, "BRK-100", dec!(10), dec!(15)).await;
    let wh = create_warehouse(&db, "Main").await;
    let repair = create_repair(&db).await;
    seed_level(&db, item.id, wh.id, 20, 5).await;

    let result = service
        .issue_part(issue_request(repair.id, item.id, wh.id, 16))
        .await
        .expect("issue failed");

    assert_eq!(result.stock_level.quantity, 4);
    assert!(result.stock_level.is_low_stock);
    assert_eq!(result.total_cost, dec!(160));
    assert_eq!(result.total_price, dec!(240));
    assert_eq!(result.profit, dec!(80));
    assert!(!result.approval_required);
    assert!(result.approval_id.is_none());
    assert!(!result.negative_stock);
    assert_eq!(result.repair_actual_cost, dec!(160));

    let movements = StockMovement::find()
        .filter(stock_movement::Column::InventoryItemId.eq(item.id))
        .all(db.as_ref())
        .await
        .expect("movement query failed");
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, "out");
    assert_eq!(movements[0].quantity, 16);
    assert_eq!(movements[0].signed_quantity, -16);
    assert_eq!(movements[0].from_warehouse_id, Some(wh.id));
    assert_eq!(movements[0].reference_type.as_deref(), Some("repair"));
    assert_eq!(movements[0].reference_id, Some(repair.id));

    // Quantity 4 with min 5 leaves a low-stock warning alert.
    let alerts = StockAlert::find()
        .filter(stock_alert::Column::Status.eq("active"))
        .all(db.as_ref())
        .await
        .expect("alert query failed");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].alert_type, "low_stock");
    assert_eq!(alerts[0].severity, "warning");
}

#[tokio::test]
async fn expensive_issue_is_gated_but_still_decrements() {
    let db = setup_db("issue_gated").await;
    let (service, _rx) = issuance_service(&db);

    let item = create_item(&db, "ENG-200", dec!(10), dec!(15)).await;
    let wh = create_warehouse(&db, "Main").await;
    let repair = create_repair(&db).await;
    seed_level(&db, item.id, wh.id, 20, 5).await;

    // 60 x 10 = 600 > 500: supervisor approval, normal priority. No other
    // warehouse holds stock, so the urgent override lets it go negative.
    let result = service
        .issue_part(issue_request(repair.id, item.id, wh.id, 60))
        .await
        .expect("issue failed");

    assert_eq!(result.total_cost, dec!(600));
    assert!(result.approval_required);
    assert!(result.negative_stock);
    assert_eq!(result.stock_level.quantity, -40);

    let approval = stockroom_api::entities::repair_parts_approval::Entity::find_by_id(
        result.approval_id.expect("approval id missing"),
    )
    .one(db.as_ref())
    .await
    .expect("approval query failed")
    .expect("approval row missing");
    assert_eq!(approval.status, "pending");
    assert_eq!(approval.priority, "normal");
    assert_eq!(approval.approver_role, "supervisor");
    assert_eq!(approval.total_cost, dec!(600));

    let part = stockroom_api::entities::parts_used::Entity::find_by_id(result.parts_used_id)
        .one(db.as_ref())
        .await
        .expect("parts query failed")
        .expect("parts row missing");
    assert_eq!(part.status, "requested");

    // Gated-but-unapproved parts do not count toward the repair cost yet.
    assert_eq!(result.repair_actual_cost, dec!(0));

    let alert = StockAlert::find()
        .filter(stock_alert::Column::Status.eq("active"))
        .one(db.as_ref())
        .await
        .expect("alert query failed")
        .expect("alert missing");
    assert_eq!(alert.alert_type, "out_of_stock");
    assert_eq!(alert.severity, "critical");
}

#[tokio::test]
async fn approval_boundary_is_strict() {
    let db = setup_db("issue_boundary").await;
    let (service, _rx) = issuance_service(&db);

    let exact = create_item(&db, "EXACT-500", dec!(50), dec!(60)).await;
    let over = create_item(&db, "OVER-500", dec!(500.01), dec!(600)).await;
    let wh = create_warehouse(&db, "Main").await;
    let repair = create_repair(&db).await;
    seed_level(&db, exact.id, wh.id, 100, 0).await;
    seed_level(&db, over.id, wh.id, 100, 0).await;

    // 10 x 50.00 = 500.00 exactly: passes without approval.
    let at_threshold = service
        .issue_part(issue_request(repair.id, exact.id, wh.id, 10))
        .await
        .expect("issue failed");
    assert!(!at_threshold.approval_required);

    // 1 x 500.01: gated.
    let above = service
        .issue_part(issue_request(repair.id, over.id, wh.id, 1))
        .await
        .expect("issue failed");
    assert!(above.approval_required);
}

#[tokio::test]
async fn shortage_with_alternatives_rejects_without_mutation() {
    let db = setup_db("issue_shortage").await;
    let (service, _rx) = issuance_service(&db);

    let item = create_item(&db, "FLT-300", dec!(10), dec!(15)).await;
    let main = create_warehouse(&db, "Main").await;
    let annex = create_warehouse(&db, "Annex").await;
    let repair = create_repair(&db).await;
    seed_level(&db, item.id, main.id, 4, 0).await;
    seed_level(&db, item.id, annex.id, 12, 0).await;

    let err = service
        .issue_part(issue_request(repair.id, item.id, main.id, 10))
        .await
        .expect_err("expected shortage rejection");

    match err {
        ServiceError::InsufficientStock(details) => {
            assert_eq!(details.requested, 10);
            assert_eq!(details.available, 4);
            assert_eq!(details.shortage, 6);
            assert_eq!(details.alternatives.len(), 1);
            assert_eq!(details.alternatives[0].warehouse_id, annex.id);
            assert_eq!(details.alternatives[0].warehouse_name, "Annex");
            assert_eq!(details.alternatives[0].quantity, 12);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Nothing moved.
    let level = StockLevel::find()
        .filter(stock_level::Column::InventoryItemId.eq(item.id))
        .filter(stock_level::Column::WarehouseId.eq(main.id))
        .one(db.as_ref())
        .await
        .expect("level query failed")
        .expect("level missing");
    assert_eq!(level.quantity, 4);

    let movements = StockMovement::find().all(db.as_ref()).await.expect("query");
    assert!(movements.is_empty());
}

#[tokio::test]
async fn repeated_low_stock_keeps_single_alert_row() {
    let db = setup_db("issue_alert_idempotent").await;
    let (service, _rx) = issuance_service(&db);

    let item = create_item(&db, "BLT-400", dec!(2), dec!(4)).await;
    let wh = create_warehouse(&db, "Main").await;
    let repair = create_repair(&db).await;
    seed_level(&db, item.id, wh.id, 10, 8).await;

    for _ in 0..3 {
        service
            .issue_part(issue_request(repair.id, item.id, wh.id, 1))
            .await
            .expect("issue failed");
    }

    let alerts = StockAlert::find()
        .filter(stock_alert::Column::InventoryItemId.eq(item.id))
        .all(db.as_ref())
        .await
        .expect("alert query failed");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].status, "active");
    assert_eq!(alerts[0].alert_type, "low_stock");
}

#[tokio::test]
async fn rejects_unknown_item_and_zero_quantity() {
    let db = setup_db("issue_validation").await;
    let (service, _rx) = issuance_service(&db);

    let wh = create_warehouse(&db, "Main").await;
    let repair = create_repair(&db).await;

    let err = service
        .issue_part(issue_request(repair.id, 9999, wh.id, 1))
        .await
        .expect_err("expected missing item");
    assert_matches!(err, ServiceError::NotFound(_));

    let item = create_item(&db, "NUT-500", dec!(1), dec!(2)).await;
    let err = service
        .issue_part(issue_request(repair.id, item.id, wh.id, 0))
        .await
        .expect_err("expected validation failure");
    assert_matches!(
        err,
        ServiceError::ValidationError(_) | ServiceError::InvalidInput(_)
    );
}

#[tokio::test]
async fn adjustment_reconciles_negative_stock() {
    let db = setup_db("adjust_stock").await;
    let (tx, _rx) = mpsc::channel(100);
    let stock = StockService::new(Arc::clone(&db), EventSender::new(tx));

    let item = create_item(&db, "ADJ-600", dec!(5), dec!(9)).await;
    let wh = create_warehouse(&db, "Main").await;
    seed_level(&db, item.id, wh.id, -3, 0).await;

    let result = stock
        .adjust_stock(AdjustStockRequest {
            inventory_item_id: item.id,
            warehouse_id: wh.id,
            delta: 8,
            reason: "cycle count".into(),
            created_by: Some(3),
        })
        .await
        .expect("adjust failed");

    assert_eq!(result.stock_level.quantity, 5);
    assert!(!result.stock_level.is_low_stock);

    let movement = StockMovement::find_by_id(result.movement_id)
        .one(db.as_ref())
        .await
        .expect("movement query failed")
        .expect("movement missing");
    assert_eq!(movement.movement_type, "adjustment");
    assert_eq!(movement.quantity, 8);
    assert_eq!(movement.signed_quantity, 8);
    assert_eq!(movement.reference_type.as_deref(), Some("adjustment"));
    assert_eq!(movement.notes.as_deref(), Some("cycle count"));

    let err = stock
        .adjust_stock(AdjustStockRequest {
            inventory_item_id: item.id,
            warehouse_id: wh.id,
            delta: 0,
            reason: "noop".into(),
            created_by: None,
        })
        .await
        .expect_err("expected zero-delta rejection");
    assert_matches!(err, ServiceError::InvalidInput(_));
}
