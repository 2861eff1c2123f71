use assert_matches::assert_matches;
use chrono::{Datelike, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, NotSet, QueryFilter, Set};
use std::sync::Arc;
use stockroom_api::{
    db::{establish_connection, run_migrations, DbPool},
    entities::{
        stock_alert::{self, Entity as StockAlert},
        stock_level::{self, Entity as StockLevel},
        stock_movement::{self, Entity as StockMovement},
        stock_transfer::Entity as StockTransfer,
        stock_transfer_item::{self, Entity as StockTransferItem},
        warehouse,
    },
    errors::ServiceError,
    events::EventSender,
    services::transfers::{CreateTransferRequest, TransferLineRequest, TransferService},
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

fn transfer_service(db: &Arc<DbPool>) -> TransferService {
    let (tx, rx) = mpsc::channel(100);
    // Detach the receiver; transfer events are fire-and-forget here.
    tokio::spawn(async move {
        let mut rx = rx;
        while rx.recv().await.is_some() {}
    });
    TransferService::new(Arc::clone(db), EventSender::new(tx))
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

async fn seed_level(db: &DbPool, item_id: i64, warehouse_id: i64, quantity: i32, min_level: i32) {
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
    .expect("failed to seed stock level");
}

async fn quantity_at(db: &DbPool, item_id: i64, warehouse_id: i64) -> i32 {
    StockLevel::find()
        .filter(stock_level::Column::InventoryItemId.eq(item_id))
        .filter(stock_level::Column::WarehouseId.eq(warehouse_id))
        .one(db)
        .await
        .expect("level query failed")
        .map(|level| level.quantity)
        .unwrap_or(0)
}

fn request(from: i64, to: i64, item: i64, quantity: i32) -> CreateTransferRequest {
    CreateTransferRequest {
        from_warehouse_id: from,
        to_warehouse_id: to,
        requested_by: 1,
        reason: Some("rebalance".into()),
        notes: None,
        items: vec![TransferLineRequest {
            inventory_item_id: item,
            quantity,
            notes: None,
        }],
    }
}

#[tokio::test]
async fn transfer_numbers_are_sequential_per_year() {
    let db = setup_db("transfer_numbers").await;
    let service = transfer_service(&db);

    let a = create_warehouse(&db, "A").await;
    let b = create_warehouse(&db, "B").await;

    let first = service
        .create_transfer(request(a.id, b.id, 1, 5))
        .await
        .expect("create failed");
    let second = service
        .create_transfer(request(a.id, b.id, 1, 3))
        .await
        .expect("create failed");

    let year = Utc::now().year();
    assert_eq!(
        first.transfer.transfer_number,
        format!("ST-{}-000001", year)
    );
    assert_eq!(
        second.transfer.transfer_number,
        format!("ST-{}-000002", year)
    );
    assert_eq!(first.transfer.status, "pending");
    assert_eq!(first.items.len(), 1);

    // Creation moves no stock.
    let movements = StockMovement::find().all(db.as_ref()).await.expect("query");
    assert!(movements.is_empty());
}

#[tokio::test]
async fn same_warehouse_transfer_is_rejected() {
    let db = setup_db("transfer_same_wh").await;
    let service = transfer_service(&db);
    let a = create_warehouse(&db, "A").await;

    let err = service
        .create_transfer(request(a.id, a.id, 1, 5))
        .await
        .expect_err("expected rejection");
    assert_matches!(err, ServiceError::InvalidInput(_));
}

#[tokio::test]
async fn ship_from_pending_is_guarded() {
    let db = setup_db("transfer_guard").await;
    let service = transfer_service(&db);

    let a = create_warehouse(&db, "A").await;
    let b = create_warehouse(&db, "B").await;
    seed_level(&db, 1, a.id, 10, 0).await;

    let created = service
        .create_transfer(request(a.id, b.id, 1, 5))
        .await
        .expect("create failed");

    let err = service
        .ship(created.transfer.id, 2)
        .await
        .expect_err("expected guard failure");
    match err {
        ServiceError::InvalidStateTransition {
            entity,
            attempted,
            current,
        } => {
            assert_eq!(entity, "transfer");
            assert_eq!(attempted, "ship");
            assert_eq!(current, "pending");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    // Header untouched, stock untouched.
    let transfer = StockTransfer::find_by_id(created.transfer.id)
        .one(db.as_ref())
        .await
        .expect("query failed")
        .expect("transfer missing");
    assert_eq!(transfer.status, "pending");
    assert_eq!(quantity_at(&db, 1, a.id).await, 10);
}

#[tokio::test]
async fn receive_moves_stock_and_conserves_quantity() {
    let db = setup_db("transfer_receive").await;
    let service = transfer_service(&db);

    let a = create_warehouse(&db, "A").await;
    let b = create_warehouse(&db, "B").await;
    let item_id = 1;
    // Source holds 4 with minimum 5; destination has never held stock.
    seed_level(&db, item_id, a.id, 4, 5).await;

    let created = service
        .create_transfer(request(a.id, b.id, item_id, 5))
        .await
        .expect("create failed");
    let id = created.transfer.id;

    service.approve(id, 2).await.expect("approve failed");
    service.ship(id, 3).await.expect("ship failed");
    let result = service.receive(id, 4).await.expect("receive failed");

    assert_eq!(result.transfer.status, "received");
    assert_eq!(result.lines.len(), 1);
    let line = &result.lines[0];
    assert_eq!(line.source_quantity_after, -1);
    assert_eq!(line.destination_quantity_after, 5);
    assert!(line.negative_source);

    assert_eq!(quantity_at(&db, item_id, a.id).await, -1);
    assert_eq!(quantity_at(&db, item_id, b.id).await, 5);
    // Conservation: deltas cancel.
    assert_eq!(
        line.source_quantity_after + line.destination_quantity_after,
        4
    );

    let movements = StockMovement::find()
        .filter(stock_movement::Column::ReferenceId.eq(id))
        .all(db.as_ref())
        .await
        .expect("movement query failed");
    assert_eq!(movements.len(), 2);
    let outbound = movements
        .iter()
        .find(|m| m.movement_type == "transfer_out")
        .expect("transfer_out missing");
    let inbound = movements
        .iter()
        .find(|m| m.movement_type == "transfer_in")
        .expect("transfer_in missing");
    assert_eq!(outbound.signed_quantity, -5);
    assert_eq!(inbound.signed_quantity, 5);
    assert_eq!(outbound.signed_quantity + inbound.signed_quantity, 0);

    // Source went negative: critical alert raised there.
    let source_alert = StockAlert::find()
        .filter(stock_alert::Column::WarehouseId.eq(a.id))
        .filter(stock_alert::Column::Status.eq("active"))
        .one(db.as_ref())
        .await
        .expect("alert query failed")
        .expect("source alert missing");
    assert_eq!(source_alert.alert_type, "out_of_stock");
    assert_eq!(source_alert.severity, "critical");

    // Destination is healthy; no active alert.
    let dest_alert = StockAlert::find()
        .filter(stock_alert::Column::WarehouseId.eq(b.id))
        .filter(stock_alert::Column::Status.eq("active"))
        .one(db.as_ref())
        .await
        .expect("alert query failed");
    assert!(dest_alert.is_none());

    // Completed is the only transition left; delete is now forbidden.
    let completed = service.complete(id).await.expect("complete failed");
    assert_eq!(completed.status, "completed");
    let err = service
        .delete_transfer(id)
        .await
        .expect_err("expected delete guard");
    assert_matches!(err, ServiceError::InvalidStateTransition { .. });
}

#[tokio::test]
async fn pending_transfer_can_be_deleted_with_items() {
    let db = setup_db("transfer_delete").await;
    let service = transfer_service(&db);

    let a = create_warehouse(&db, "A").await;
    let b = create_warehouse(&db, "B").await;

    let created = service
        .create_transfer(request(a.id, b.id, 1, 5))
        .await
        .expect("create failed");

    service
        .delete_transfer(created.transfer.id)
        .await
        .expect("delete failed");

    let header = StockTransfer::find_by_id(created.transfer.id)
        .one(db.as_ref())
        .await
        .expect("query failed");
    assert!(header.is_none());
    let items = StockTransferItem::find()
        .filter(stock_transfer_item::Column::TransferId.eq(created.transfer.id))
        .all(db.as_ref())
        .await
        .expect("query failed");
    assert!(items.is_empty());
}
