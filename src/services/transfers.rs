use crate::{
    db::DbPool,
    entities::{
        stock_transfer::{self, Entity as StockTransfer},
        stock_transfer_item::{self, Entity as StockTransferItem},
        transfer_sequence::{self, Entity as TransferSequence},
        warehouse::{self, Entity as Warehouse},
        MovementType, TransferStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{alerts, movements, stock_levels},
};
use chrono::{Datelike, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransferRequest {
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub requested_by: i64,
    pub reason: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub items: Vec<TransferLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLineRequest {
    pub inventory_item_id: i64,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferWithItems {
    #[serde(flatten)]
    pub transfer: stock_transfer::Model,
    pub items: Vec<stock_transfer_item::Model>,
}

/// Per-line outcome of a receive, including the post-move quantities.
#[derive(Debug, Clone, Serialize)]
pub struct ReceivedLine {
    pub inventory_item_id: i64,
    pub quantity: i32,
    pub source_quantity_after: i32,
    pub destination_quantity_after: i32,
    /// Source went negative applying this line
    pub negative_source: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReceiveResult {
    pub transfer: stock_transfer::Model,
    pub lines: Vec<ReceivedLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferFilter {
    pub warehouse_id: Option<i64>,
    pub status: Option<String>,
    pub from_date: Option<chrono::DateTime<Utc>>,
    pub to_date: Option<chrono::DateTime<Utc>>,
}

/// Warehouse-to-warehouse moves. Stock changes only at receive; every
/// other transition is bookkeeping on the header.
#[derive(Clone)]
pub struct TransferService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl TransferService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a `pending` transfer with its lines. No stock moves yet.
    #[instrument(skip(self, request), fields(
        from = request.from_warehouse_id,
        to = request.to_warehouse_id,
    ))]
    pub async fn create_transfer(
        &self,
        request: CreateTransferRequest,
    ) -> Result<TransferWithItems, ServiceError> {
        request.validate()?;
        if request.from_warehouse_id == request.to_warehouse_id {
            return Err(ServiceError::InvalidInput(
                "source and destination warehouse must differ".into(),
            ));
        }
        if request.items.iter().any(|line| line.quantity <= 0) {
            return Err(ServiceError::InvalidInput(
                "transfer line quantities must be positive".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let req = request.clone();

        let created = db
            .transaction::<_, TransferWithItems, ServiceError>(move |txn| {
                Box::pin(async move {
                    for warehouse_id in [req.from_warehouse_id, req.to_warehouse_id] {
                        Warehouse::find_active()
                            .filter(warehouse::Column::Id.eq(warehouse_id))
                            .one(txn)
                            .await?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Warehouse {} not found",
                                    warehouse_id
                                ))
                            })?;
                    }

                    let transfer_number = next_transfer_number(txn).await?;
                    let now = Utc::now();

                    let transfer = stock_transfer::ActiveModel {
                        id: NotSet,
                        transfer_number: Set(transfer_number),
                        from_warehouse_id: Set(req.from_warehouse_id),
                        to_warehouse_id: Set(req.to_warehouse_id),
                        status: Set(TransferStatus::Pending.as_ref().to_string()),
                        reason: Set(req.reason.clone()),
                        notes: Set(req.notes.clone()),
                        requested_by: Set(req.requested_by),
                        approved_by: NotSet,
                        shipped_by: NotSet,
                        shipped_at: NotSet,
                        received_by: NotSet,
                        received_at: NotSet,
                        created_at: Set(now),
                        updated_at: Set(now),
                    }
                    .insert(txn)
                    .await?;

                    let mut items = Vec::with_capacity(req.items.len());
                    for line in &req.items {
                        let item = stock_transfer_item::ActiveModel {
                            id: NotSet,
                            transfer_id: Set(transfer.id),
                            inventory_item_id: Set(line.inventory_item_id),
                            quantity: Set(line.quantity),
                            notes: Set(line.notes.clone()),
                        }
                        .insert(txn)
                        .await?;
                        items.push(item);
                    }

                    info!(
                        transfer = transfer.id,
                        number = %transfer.transfer_number,
                        lines = items.len(),
                        "transfer created"
                    );

                    Ok(TransferWithItems { transfer, items })
                })
            })
            .await
            .map_err(map_txn_err)?;

        let event = Event::TransferCreated {
            transfer_id: created.transfer.id,
            transfer_number: created.transfer.transfer_number.clone(),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish transfer created event: {}", e);
        }

        Ok(created)
    }

    pub async fn approve(
        &self,
        transfer_id: i64,
        approved_by: i64,
    ) -> Result<stock_transfer::Model, ServiceError> {
        self.transition(transfer_id, TransferStatus::Pending, "approve", move |mut active| {
            active.status = Set(TransferStatus::Approved.as_ref().to_string());
            active.approved_by = Set(Some(approved_by));
            active
        })
        .await
    }

    pub async fn ship(
        &self,
        transfer_id: i64,
        shipped_by: i64,
    ) -> Result<stock_transfer::Model, ServiceError> {
        self.transition(transfer_id, TransferStatus::Approved, "ship", move |mut active| {
            active.status = Set(TransferStatus::Shipped.as_ref().to_string());
            active.shipped_by = Set(Some(shipped_by));
            active.shipped_at = Set(Some(Utc::now()));
            active
        })
        .await
    }

    pub async fn complete(
        &self,
        transfer_id: i64,
    ) -> Result<stock_transfer::Model, ServiceError> {
        self.transition(
            transfer_id,
            TransferStatus::Received,
            "complete",
            |mut active| {
                active.status = Set(TransferStatus::Completed.as_ref().to_string());
                active
            },
        )
        .await
    }

    /// The stock-affecting step: applies every line or nothing.
    #[instrument(skip(self))]
    pub async fn receive(
        &self,
        transfer_id: i64,
        received_by: i64,
    ) -> Result<ReceiveResult, ServiceError> {
        let db = self.db_pool.as_ref();

        let result = db
            .transaction::<_, ReceiveResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer(txn, transfer_id).await?;
                    require_status(&transfer, TransferStatus::Shipped, "receive")?;

                    let lines = StockTransferItem::find()
                        .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
                        .order_by_asc(stock_transfer_item::Column::Id)
                        .all(txn)
                        .await?;
                    if lines.is_empty() {
                        return Err(ServiceError::InvalidInput(format!(
                            "Transfer {} has no lines",
                            transfer_id
                        )));
                    }

                    // Lock every touched (item, warehouse) row in ascending
                    // order so two concurrent receives over the same pairs
                    // cannot deadlock.
                    let mut pairs: Vec<(i64, i64)> = lines
                        .iter()
                        .flat_map(|line| {
                            [
                                (line.inventory_item_id, transfer.from_warehouse_id),
                                (line.inventory_item_id, transfer.to_warehouse_id),
                            ]
                        })
                        .collect();
                    pairs.sort_unstable();
                    pairs.dedup();

                    let mut levels = BTreeMap::new();
                    for (item_id, warehouse_id) in pairs {
                        let level =
                            stock_levels::lock_or_create_level(txn, item_id, warehouse_id).await?;
                        levels.insert((item_id, warehouse_id), level);
                    }

                    let mut received = Vec::with_capacity(lines.len());
                    for line in &lines {
                        let source_key = (line.inventory_item_id, transfer.from_warehouse_id);
                        let dest_key = (line.inventory_item_id, transfer.to_warehouse_id);

                        let source = levels
                            .remove(&source_key)
                            .ok_or_else(|| ServiceError::InternalError(
                                "locked level disappeared during receive".into(),
                            ))?;
                        let source = stock_levels::apply_delta(txn, source, -line.quantity).await?;
                        alerts::reflect(txn, &source).await?;
                        let negative_source = source.quantity < 0;
                        if negative_source {
                            warn!(
                                transfer = transfer_id,
                                item = line.inventory_item_id,
                                warehouse = transfer.from_warehouse_id,
                                quantity = source.quantity,
                                "transfer receive drove source stock negative"
                            );
                        }
                        let source_quantity_after = source.quantity;
                        levels.insert(source_key, source);

                        let dest = levels
                            .remove(&dest_key)
                            .ok_or_else(|| ServiceError::InternalError(
                                "locked level disappeared during receive".into(),
                            ))?;
                        let dest = stock_levels::apply_delta(txn, dest, line.quantity).await?;
                        alerts::reflect(txn, &dest).await?;
                        let destination_quantity_after = dest.quantity;
                        levels.insert(dest_key, dest);

                        movements::record_movement(
                            txn,
                            movements::NewMovement {
                                inventory_item_id: line.inventory_item_id,
                                movement_type: MovementType::TransferOut,
                                quantity: line.quantity,
                                signed_quantity: -line.quantity,
                                from_warehouse_id: Some(transfer.from_warehouse_id),
                                to_warehouse_id: Some(transfer.to_warehouse_id),
                                reference_type: Some("transfer".into()),
                                reference_id: Some(transfer_id),
                                created_by: Some(received_by),
                                notes: line.notes.clone(),
                            },
                        )
                        .await?;
                        movements::record_movement(
                            txn,
                            movements::NewMovement {
                                inventory_item_id: line.inventory_item_id,
                                movement_type: MovementType::TransferIn,
                                quantity: line.quantity,
                                signed_quantity: line.quantity,
                                from_warehouse_id: Some(transfer.from_warehouse_id),
                                to_warehouse_id: Some(transfer.to_warehouse_id),
                                reference_type: Some("transfer".into()),
                                reference_id: Some(transfer_id),
                                created_by: Some(received_by),
                                notes: line.notes.clone(),
                            },
                        )
                        .await?;

                        received.push(ReceivedLine {
                            inventory_item_id: line.inventory_item_id,
                            quantity: line.quantity,
                            source_quantity_after,
                            destination_quantity_after,
                            negative_source,
                        });
                    }

                    let mut active: stock_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Received.as_ref().to_string());
                    active.received_by = Set(Some(received_by));
                    active.received_at = Set(Some(Utc::now()));
                    active.updated_at = Set(Utc::now());
                    let transfer = active.update(txn).await?;

                    info!(
                        transfer = transfer.id,
                        lines = received.len(),
                        "transfer received"
                    );

                    Ok(ReceiveResult {
                        transfer,
                        lines: received,
                    })
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.publish_status_change(
            result.transfer.id,
            TransferStatus::Shipped.as_ref(),
            TransferStatus::Received.as_ref(),
        )
        .await;

        Ok(result)
    }

    /// Deletes a transfer that has not yet moved stock.
    pub async fn delete_transfer(&self, transfer_id: i64) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let transfer = find_transfer(txn, transfer_id).await?;

                let terminal = [
                    TransferStatus::Received.as_ref(),
                    TransferStatus::Completed.as_ref(),
                ];
                if terminal.contains(&transfer.status.as_str()) {
                    return Err(ServiceError::InvalidStateTransition {
                        entity: "transfer",
                        attempted: "delete",
                        current: transfer.status,
                    });
                }

                StockTransferItem::delete_many()
                    .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
                    .exec(txn)
                    .await?;
                StockTransfer::delete_by_id(transfer_id).exec(txn).await?;

                info!(transfer = transfer_id, "transfer deleted");
                Ok(())
            })
        })
        .await
        .map_err(map_txn_err)?;

        let event = Event::TransferDeleted { transfer_id };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish transfer deleted event: {}", e);
        }

        Ok(())
    }

    pub async fn get_transfer(
        &self,
        transfer_id: i64,
    ) -> Result<TransferWithItems, ServiceError> {
        let db = self.db_pool.as_ref();

        let transfer = StockTransfer::find_by_id(transfer_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Transfer {} not found", transfer_id))
            })?;
        let items = StockTransferItem::find()
            .filter(stock_transfer_item::Column::TransferId.eq(transfer_id))
            .order_by_asc(stock_transfer_item::Column::Id)
            .all(db)
            .await?;

        Ok(TransferWithItems { transfer, items })
    }

    pub async fn list_transfers(
        &self,
        filter: TransferFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_transfer::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockTransfer::find();
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(
                sea_orm::Condition::any()
                    .add(stock_transfer::Column::FromWarehouseId.eq(warehouse_id))
                    .add(stock_transfer::Column::ToWarehouseId.eq(warehouse_id)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(stock_transfer::Column::Status.eq(status));
        }
        if let Some(from) = filter.from_date {
            query = query.filter(stock_transfer::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(stock_transfer::Column::CreatedAt.lte(to));
        }

        let paginator = query
            .order_by_desc(stock_transfer::Column::CreatedAt)
            .order_by_desc(stock_transfer::Column::Id)
            .paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Shared guard-then-update path for the stock-neutral transitions.
    async fn transition<F>(
        &self,
        transfer_id: i64,
        expected: TransferStatus,
        attempted: &'static str,
        apply: F,
    ) -> Result<stock_transfer::Model, ServiceError>
    where
        F: FnOnce(stock_transfer::ActiveModel) -> stock_transfer::ActiveModel + Send + 'static,
    {
        let db = self.db_pool.as_ref();

        let (updated, old_status) = db
            .transaction::<_, (stock_transfer::Model, String), ServiceError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer(txn, transfer_id).await?;
                    require_status(&transfer, expected, attempted)?;
                    let old_status = transfer.status.clone();

                    let mut active = apply(transfer.into());
                    active.updated_at = Set(Utc::now());
                    let updated = active.update(txn).await?;

                    info!(
                        transfer = transfer_id,
                        from = %old_status,
                        to = %updated.status,
                        "transfer transitioned"
                    );

                    Ok((updated, old_status))
                })
            })
            .await
            .map_err(map_txn_err)?;

        self.publish_status_change(updated.id, &old_status, &updated.status)
            .await;

        Ok(updated)
    }

    async fn publish_status_change(&self, transfer_id: i64, old: &str, new: &str) {
        let event = Event::TransferStatusChanged {
            transfer_id,
            old_status: old.to_string(),
            new_status: new.to_string(),
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish transfer status event: {}", e);
        }
    }
}

fn map_txn_err(e: TransactionError<ServiceError>) -> ServiceError {
    match e {
        TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

async fn find_transfer(
    txn: &DatabaseTransaction,
    transfer_id: i64,
) -> Result<stock_transfer::Model, ServiceError> {
    StockTransfer::find_by_id(transfer_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", transfer_id)))
}

fn require_status(
    transfer: &stock_transfer::Model,
    expected: TransferStatus,
    attempted: &'static str,
) -> Result<(), ServiceError> {
    if transfer.status != expected.as_ref() {
        return Err(ServiceError::InvalidStateTransition {
            entity: "transfer",
            attempted,
            current: transfer.status.clone(),
        });
    }
    Ok(())
}

/// Allocates the next `ST-<year>-<seq>` number from the per-year counter,
/// inside the caller's transaction so concurrent creates serialize on the
/// counter row instead of racing a wall-clock suffix.
async fn next_transfer_number(txn: &DatabaseTransaction) -> Result<String, ServiceError> {
    let year = Utc::now().year();

    let mut query = TransferSequence::find_by_id(year);
    if matches!(
        txn.get_database_backend(),
        DbBackend::Postgres | DbBackend::MySql
    ) {
        query = query.lock_exclusive();
    }

    let next = match query.one(txn).await? {
        Some(seq) => {
            let next = seq.last_seq + 1;
            let mut active: transfer_sequence::ActiveModel = seq.into();
            active.last_seq = Set(next);
            active.update(txn).await?;
            next
        }
        None => {
            transfer_sequence::ActiveModel {
                year: Set(year),
                last_seq: Set(1),
            }
            .insert(txn)
            .await?;
            1
        }
    };

    Ok(format_transfer_number(year, next))
}

fn format_transfer_number(year: i32, seq: i32) -> String {
    format!("ST-{}-{:06}", year, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_numbers_are_zero_padded() {
        assert_eq!(format_transfer_number(2026, 1), "ST-2026-000001");
        assert_eq!(format_transfer_number(2026, 123456), "ST-2026-123456");
    }

    #[test]
    fn guard_rejects_wrong_status() {
        let transfer = stock_transfer::Model {
            id: 1,
            transfer_number: "ST-2026-000001".into(),
            from_warehouse_id: 1,
            to_warehouse_id: 2,
            status: TransferStatus::Pending.as_ref().to_string(),
            reason: None,
            notes: None,
            requested_by: 1,
            approved_by: None,
            shipped_by: None,
            shipped_at: None,
            received_by: None,
            received_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = require_status(&transfer, TransferStatus::Shipped, "receive").unwrap_err();
        match err {
            ServiceError::InvalidStateTransition {
                attempted, current, ..
            } => {
                assert_eq!(attempted, "receive");
                assert_eq!(current, "pending");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(require_status(&transfer, TransferStatus::Pending, "approve").is_ok());
    }
}
