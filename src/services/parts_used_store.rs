use crate::{
    db::DbPool,
    entities::{
        parts_used::{self, Entity as PartsUsed},
        PartsUsedStatus,
    },
    errors::ServiceError,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseTransaction, EntityTrait, NotSet, QuerySelect, Set};
use std::sync::Arc;
use tracing::{info, warn};

/// Consumption record as the issuance transaction wants to write it.
#[derive(Debug, Clone)]
pub struct NewPartsUsed {
    pub repair_request_id: i64,
    pub inventory_item_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
    pub status: PartsUsedStatus,
    pub unit_purchase_price: Decimal,
    pub unit_selling_price: Decimal,
    pub total_cost: Decimal,
    pub total_price: Decimal,
    pub profit: Decimal,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub requested_by: Option<i64>,
}

/// Writer for `parts_used` rows. Two implementations cover the two schema
/// generations seen in the field: deployments migrated before the pricing
/// columns landed still run the narrow table.
#[async_trait]
pub trait PartsUsedStore: Send + Sync {
    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        record: NewPartsUsed,
    ) -> Result<parts_used::Model, ServiceError>;
}

/// Full column set: selling price, total price, profit, serial number.
pub struct EnhancedPartsUsedStore;

#[async_trait]
impl PartsUsedStore for EnhancedPartsUsedStore {
    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        record: NewPartsUsed,
    ) -> Result<parts_used::Model, ServiceError> {
        let now = Utc::now();
        let inserted = parts_used::ActiveModel {
            id: NotSet,
            repair_request_id: Set(record.repair_request_id),
            inventory_item_id: Set(record.inventory_item_id),
            warehouse_id: Set(record.warehouse_id),
            quantity: Set(record.quantity),
            status: Set(record.status.as_ref().to_string()),
            unit_purchase_price: Set(record.unit_purchase_price),
            unit_selling_price: Set(Some(record.unit_selling_price)),
            total_cost: Set(record.total_cost),
            total_price: Set(Some(record.total_price)),
            profit: Set(Some(record.profit)),
            serial_number: Set(record.serial_number),
            notes: Set(record.notes),
            requested_by: Set(record.requested_by),
            approved_by: NotSet,
            approved_at: NotSet,
            invoice_item_id: NotSet,
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        Ok(inserted)
    }
}

/// Pre-enhancement column set. Cost-side pricing only; the selling-side
/// columns stay NULL so the rollup and invoicing paths skip them.
pub struct BasicPartsUsedStore;

#[async_trait]
impl PartsUsedStore for BasicPartsUsedStore {
    async fn insert(
        &self,
        txn: &DatabaseTransaction,
        record: NewPartsUsed,
    ) -> Result<parts_used::Model, ServiceError> {
        let now = Utc::now();
        let inserted = parts_used::ActiveModel {
            id: NotSet,
            repair_request_id: Set(record.repair_request_id),
            inventory_item_id: Set(record.inventory_item_id),
            warehouse_id: Set(record.warehouse_id),
            quantity: Set(record.quantity),
            status: Set(record.status.as_ref().to_string()),
            unit_purchase_price: Set(record.unit_purchase_price),
            unit_selling_price: NotSet,
            total_cost: Set(record.total_cost),
            total_price: NotSet,
            profit: NotSet,
            serial_number: NotSet,
            notes: Set(record.notes),
            requested_by: Set(record.requested_by),
            approved_by: NotSet,
            approved_at: NotSet,
            invoice_item_id: NotSet,
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        Ok(inserted)
    }
}

/// Probes the schema once at startup: if the selling-price column is
/// selectable the deployment runs the enhanced table.
pub async fn detect_store(db: &DbPool) -> Arc<dyn PartsUsedStore> {
    let probe = PartsUsed::find()
        .select_only()
        .column(parts_used::Column::UnitSellingPrice)
        .limit(1)
        .into_tuple::<Option<Decimal>>()
        .one(db)
        .await;

    match probe {
        Ok(_) => {
            info!("parts_used schema supports pricing columns; using enhanced store");
            Arc::new(EnhancedPartsUsedStore)
        }
        Err(e) => {
            warn!(
                "parts_used pricing columns unavailable ({}); falling back to basic store",
                e
            );
            Arc::new(BasicPartsUsedStore)
        }
    }
}
