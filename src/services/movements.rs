use crate::{
    db::DbPool,
    entities::{
        stock_movement::{self, Entity as StockMovement},
        MovementType,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;

/// Ledger entry to append. Written only from inside a mutation
/// transaction so a movement can never exist without its level change.
#[derive(Debug, Clone)]
pub(crate) struct NewMovement {
    pub inventory_item_id: i64,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub signed_quantity: i32,
    pub from_warehouse_id: Option<i64>,
    pub to_warehouse_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub created_by: Option<i64>,
    pub notes: Option<String>,
}

pub(crate) async fn record_movement(
    txn: &DatabaseTransaction,
    movement: NewMovement,
) -> Result<stock_movement::Model, ServiceError> {
    let inserted = stock_movement::ActiveModel {
        id: NotSet,
        inventory_item_id: Set(movement.inventory_item_id),
        movement_type: Set(movement.movement_type.as_ref().to_string()),
        quantity: Set(movement.quantity),
        signed_quantity: Set(movement.signed_quantity),
        from_warehouse_id: Set(movement.from_warehouse_id),
        to_warehouse_id: Set(movement.to_warehouse_id),
        reference_type: Set(movement.reference_type),
        reference_id: Set(movement.reference_id),
        created_by: Set(movement.created_by),
        notes: Set(movement.notes),
        created_at: Set(Utc::now()),
    }
    .insert(txn)
    .await?;

    Ok(inserted)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementFilter {
    pub inventory_item_id: Option<i64>,
    /// Matches the warehouse on either side of the movement
    pub warehouse_id: Option<i64>,
    pub movement_type: Option<MovementType>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

/// Read-only view over the append-only movement ledger.
#[derive(Clone)]
pub struct MovementService {
    db_pool: Arc<DbPool>,
}

impl MovementService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Movement history, newest first, paginated.
    pub async fn list_movements(
        &self,
        filter: MovementFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockMovement::find();
        if let Some(item_id) = filter.inventory_item_id {
            query = query.filter(stock_movement::Column::InventoryItemId.eq(item_id));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(
                Condition::any()
                    .add(stock_movement::Column::FromWarehouseId.eq(warehouse_id))
                    .add(stock_movement::Column::ToWarehouseId.eq(warehouse_id)),
            );
        }
        if let Some(movement_type) = filter.movement_type {
            query = query.filter(stock_movement::Column::MovementType.eq(movement_type.as_ref()));
        }
        if let Some(from) = filter.from_date {
            query = query.filter(stock_movement::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to_date {
            query = query.filter(stock_movement::Column::CreatedAt.lte(to));
        }

        let paginator = query
            .order_by_desc(stock_movement::Column::CreatedAt)
            .order_by_desc(stock_movement::Column::Id)
            .paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }
}
