use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One consumption record per issuance, carrying pricing captured at
/// issue time. Status starts at `requested` (approval gated) or `used`,
/// and moves to `approved` / `cancelled` only through the approval gate.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "parts_used")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub repair_request_id: i64,
    pub inventory_item_id: i64,
    pub warehouse_id: i64,
    pub quantity: i32,
    pub status: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub unit_purchase_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub unit_selling_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub total_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))", nullable)]
    pub profit: Option<Decimal>,
    pub serial_number: Option<String>,
    pub notes: Option<String>,
    pub requested_by: Option<i64>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<DateTimeUtc>,
    pub invoice_item_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repair_request::Entity",
        from = "Column::RepairRequestId",
        to = "super::repair_request::Column::Id"
    )]
    RepairRequest,
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::InventoryItemId",
        to = "super::inventory_item::Column::Id"
    )]
    InventoryItem,
}

impl Related<super::repair_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepairRequest.def()
    }
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
