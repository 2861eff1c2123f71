use crate::{
    db::DbPool,
    entities::{
        stock_level::{self, Entity as StockLevel},
        MovementType,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{alerts, movements},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait,
    NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionError,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Locks the (item, warehouse) stock level row for the duration of the
/// transaction. `FOR UPDATE` only exists on Postgres/MySQL; SQLite holds
/// a database-wide write lock once the transaction writes, so the plain
/// select is already safe there.
pub(crate) async fn find_level_for_update(
    txn: &DatabaseTransaction,
    inventory_item_id: i64,
    warehouse_id: i64,
) -> Result<Option<stock_level::Model>, ServiceError> {
    let mut query = StockLevel::find()
        .filter(stock_level::Column::InventoryItemId.eq(inventory_item_id))
        .filter(stock_level::Column::WarehouseId.eq(warehouse_id));

    if matches!(
        txn.get_database_backend(),
        DbBackend::Postgres | DbBackend::MySql
    ) {
        query = query.lock_exclusive();
    }

    Ok(query.one(txn).await?)
}

/// Locks the level row, creating it at quantity 0 when the pair has never
/// held stock. A freshly inserted row is owned by this transaction, so no
/// second locking select is needed.
pub(crate) async fn lock_or_create_level(
    txn: &DatabaseTransaction,
    inventory_item_id: i64,
    warehouse_id: i64,
) -> Result<stock_level::Model, ServiceError> {
    if let Some(level) = find_level_for_update(txn, inventory_item_id, warehouse_id).await? {
        return Ok(level);
    }

    let now = Utc::now();
    let created = stock_level::ActiveModel {
        id: NotSet,
        inventory_item_id: Set(inventory_item_id),
        warehouse_id: Set(warehouse_id),
        quantity: Set(0),
        min_level: Set(0),
        is_low_stock: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(txn)
    .await?;

    Ok(created)
}

/// Applies a signed delta to a locked level row and recomputes the
/// low-stock flag. Callers must hold the row lock.
pub(crate) async fn apply_delta(
    txn: &DatabaseTransaction,
    level: stock_level::Model,
    delta: i32,
) -> Result<stock_level::Model, ServiceError> {
    let new_quantity = level.quantity + delta;
    let min_level = level.min_level;

    let mut active: stock_level::ActiveModel = level.into();
    active.quantity = Set(new_quantity);
    active.is_low_stock = Set(new_quantity <= min_level);
    active.updated_at = Set(Utc::now());

    Ok(active.update(txn).await?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustStockRequest {
    pub inventory_item_id: i64,
    pub warehouse_id: i64,
    /// Signed correction; zero is rejected.
    pub delta: i32,
    pub reason: String,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdjustStockResult {
    pub stock_level: stock_level::Model,
    pub movement_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockLevelFilter {
    pub inventory_item_id: Option<i64>,
    pub warehouse_id: Option<i64>,
    /// When true, only rows currently flagged low
    pub low_stock_only: Option<bool>,
}

/// Stock level reads plus the corrective adjustment write. The issuance
/// and transfer paths mutate levels through their own transactions; this
/// service covers cycle counts and negative-balance reconciliation.
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: EventSender,
}

impl StockService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies a signed correction to one (item, warehouse) level,
    /// recording an `adjustment` movement that carries the delta.
    #[instrument(skip(self))]
    pub async fn adjust_stock(
        &self,
        request: AdjustStockRequest,
    ) -> Result<AdjustStockResult, ServiceError> {
        if request.delta == 0 {
            return Err(ServiceError::InvalidInput(
                "adjustment delta must be non-zero".into(),
            ));
        }
        if request.reason.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "adjustment reason is required".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let req = request.clone();

        let result = db
            .transaction::<_, AdjustStockResult, ServiceError>(move |txn| {
                Box::pin(async move {
                    let level =
                        lock_or_create_level(txn, req.inventory_item_id, req.warehouse_id).await?;
                    let level = apply_delta(txn, level, req.delta).await?;

                    let movement = movements::record_movement(
                        txn,
                        movements::NewMovement {
                            inventory_item_id: req.inventory_item_id,
                            movement_type: MovementType::Adjustment,
                            quantity: req.delta.abs(),
                            signed_quantity: req.delta,
                            from_warehouse_id: (req.delta < 0).then_some(req.warehouse_id),
                            to_warehouse_id: (req.delta > 0).then_some(req.warehouse_id),
                            reference_type: Some("adjustment".into()),
                            reference_id: None,
                            created_by: req.created_by,
                            notes: Some(req.reason.clone()),
                        },
                    )
                    .await?;

                    alerts::reflect(txn, &level).await?;

                    info!(
                        item = req.inventory_item_id,
                        warehouse = req.warehouse_id,
                        delta = req.delta,
                        new_quantity = level.quantity,
                        "stock adjusted"
                    );

                    Ok(AdjustStockResult {
                        stock_level: level,
                        movement_id: movement.id,
                    })
                })
            })
            .await
            .map_err(|e| match e {
                TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
                TransactionError::Transaction(service_err) => service_err,
            })?;

        let event = Event::StockAdjusted {
            inventory_item_id: request.inventory_item_id,
            warehouse_id: request.warehouse_id,
            delta: request.delta,
            new_quantity: result.stock_level.quantity,
            reason: request.reason,
        };
        if let Err(e) = self.event_sender.send(event).await {
            warn!("failed to publish stock adjustment event: {}", e);
        }

        Ok(result)
    }

    /// Paginated stock level listing.
    pub async fn list_levels(
        &self,
        filter: StockLevelFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_level::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockLevel::find();
        if let Some(item_id) = filter.inventory_item_id {
            query = query.filter(stock_level::Column::InventoryItemId.eq(item_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_level::Column::WarehouseId.eq(warehouse_id));
        }
        if filter.low_stock_only.unwrap_or(false) {
            query = query.filter(stock_level::Column::IsLowStock.eq(true));
        }

        let paginator = query
            .order_by_asc(stock_level::Column::InventoryItemId)
            .order_by_asc(stock_level::Column::WarehouseId)
            .paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }

    /// Single level lookup outside any transaction.
    pub async fn get_level(
        &self,
        inventory_item_id: i64,
        warehouse_id: i64,
    ) -> Result<Option<stock_level::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Ok(StockLevel::find()
            .filter(stock_level::Column::InventoryItemId.eq(inventory_item_id))
            .filter(stock_level::Column::WarehouseId.eq(warehouse_id))
            .one(db)
            .await?)
    }
}
