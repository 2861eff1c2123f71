use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Workflow record gating an expensive issuance. Bound to exactly one
/// `parts_used` row; `approved` and `rejected` are terminal.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "repair_parts_approvals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parts_used_id: i64,
    pub repair_request_id: i64,
    pub status: String,
    pub priority: String,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub total_cost: Decimal,
    pub approver_role: String,
    pub requested_by: Option<i64>,
    pub approved_by: Option<i64>,
    pub reason: Option<String>,
    pub requested_at: DateTimeUtc,
    pub reviewed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::parts_used::Entity",
        from = "Column::PartsUsedId",
        to = "super::parts_used::Column::Id"
    )]
    PartsUsed,
}

impl Related<super::parts_used::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PartsUsed.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
