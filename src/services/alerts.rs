use crate::{
    db::DbPool,
    entities::{
        stock_alert::{self, Entity as StockAlert},
        stock_level, AlertSeverity, AlertStatus, AlertType,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, NotSet, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Desired alert state for a given quantity, or `None` when healthy.
fn classify(quantity: i32, min_level: i32) -> Option<(AlertType, AlertSeverity)> {
    if quantity <= 0 {
        Some((AlertType::OutOfStock, AlertSeverity::Critical))
    } else if quantity <= min_level {
        Some((AlertType::LowStock, AlertSeverity::Warning))
    } else {
        None
    }
}

/// Re-evaluates the alert for one (item, warehouse) pair against the
/// just-written level. Runs inside the caller's transaction so the alert
/// table can never disagree with a committed stock level.
///
/// Maintains at most one active row per pair: raises by insert, changes
/// severity in place, resolves by stamping `resolved_at`. Returns the
/// condition now active, if any.
pub(crate) async fn reflect(
    txn: &DatabaseTransaction,
    level: &stock_level::Model,
) -> Result<Option<(AlertType, AlertSeverity)>, ServiceError> {
    let desired = classify(level.quantity, level.min_level);

    let existing = StockAlert::find()
        .filter(stock_alert::Column::InventoryItemId.eq(level.inventory_item_id))
        .filter(stock_alert::Column::WarehouseId.eq(level.warehouse_id))
        .filter(stock_alert::Column::Status.eq(AlertStatus::Active.as_ref()))
        .one(txn)
        .await?;

    let now = Utc::now();
    match (desired, existing) {
        (Some((alert_type, severity)), None) => {
            stock_alert::ActiveModel {
                id: NotSet,
                inventory_item_id: Set(level.inventory_item_id),
                warehouse_id: Set(level.warehouse_id),
                alert_type: Set(alert_type.as_ref().to_string()),
                severity: Set(severity.as_ref().to_string()),
                message: Set(alert_message(level, alert_type)),
                status: Set(AlertStatus::Active.as_ref().to_string()),
                created_at: Set(now),
                updated_at: Set(now),
                resolved_at: NotSet,
            }
            .insert(txn)
            .await?;
            debug!(
                item = level.inventory_item_id,
                warehouse = level.warehouse_id,
                alert = alert_type.as_ref(),
                "stock alert raised"
            );
        }
        (Some((alert_type, severity)), Some(alert)) => {
            // Condition persists; keep the single row current.
            let mut active: stock_alert::ActiveModel = alert.into();
            active.alert_type = Set(alert_type.as_ref().to_string());
            active.severity = Set(severity.as_ref().to_string());
            active.message = Set(alert_message(level, alert_type));
            active.updated_at = Set(now);
            active.update(txn).await?;
        }
        (None, Some(alert)) => {
            let mut active: stock_alert::ActiveModel = alert.into();
            active.status = Set(AlertStatus::Resolved.as_ref().to_string());
            active.resolved_at = Set(Some(now));
            active.updated_at = Set(now);
            active.update(txn).await?;
            debug!(
                item = level.inventory_item_id,
                warehouse = level.warehouse_id,
                "stock alert resolved"
            );
        }
        (None, None) => {}
    }

    Ok(desired)
}

fn alert_message(level: &stock_level::Model, alert_type: AlertType) -> String {
    match alert_type {
        AlertType::OutOfStock => format!(
            "Item {} is out of stock at warehouse {} (quantity {})",
            level.inventory_item_id, level.warehouse_id, level.quantity
        ),
        AlertType::LowStock => format!(
            "Item {} is low at warehouse {}: {} on hand, minimum {}",
            level.inventory_item_id, level.warehouse_id, level.quantity, level.min_level
        ),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertFilter {
    pub status: Option<String>,
    pub warehouse_id: Option<i64>,
    pub inventory_item_id: Option<i64>,
}

/// Read surface over the alert table.
#[derive(Clone)]
pub struct AlertService {
    db_pool: Arc<DbPool>,
}

impl AlertService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    pub async fn list_alerts(
        &self,
        filter: AlertFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_alert::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = StockAlert::find();
        if let Some(status) = filter.status {
            query = query.filter(stock_alert::Column::Status.eq(status));
        }
        if let Some(warehouse_id) = filter.warehouse_id {
            query = query.filter(stock_alert::Column::WarehouseId.eq(warehouse_id));
        }
        if let Some(item_id) = filter.inventory_item_id {
            query = query.filter(stock_alert::Column::InventoryItemId.eq(item_id));
        }

        let paginator = query
            .order_by_desc(stock_alert::Column::CreatedAt)
            .paginate(db, limit.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items, total))
    }
}
