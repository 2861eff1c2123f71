use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Collaborator table: completed service lines feed the repair cost
/// rollup alongside consumed parts.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repair_request_services")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub repair_request_id: i64,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub price: Decimal,
    pub status: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::repair_request::Entity",
        from = "Column::RepairRequestId",
        to = "super::repair_request::Column::Id"
    )]
    RepairRequest,
}

impl Related<super::repair_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RepairRequest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
