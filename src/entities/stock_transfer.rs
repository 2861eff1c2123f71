use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Header of a warehouse-to-warehouse move.
///
/// Lifecycle: pending -> approved -> shipped -> received -> completed.
/// Only the receive transition touches stock. Invariant:
/// `from_warehouse_id != to_warehouse_id`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_transfers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub transfer_number: String,
    pub from_warehouse_id: i64,
    pub to_warehouse_id: i64,
    pub status: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub requested_by: i64,
    pub approved_by: Option<i64>,
    pub shipped_by: Option<i64>,
    pub shipped_at: Option<DateTimeUtc>,
    pub received_by: Option<i64>,
    pub received_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_transfer_item::Entity")]
    Items,
}

impl Related<super::stock_transfer_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
