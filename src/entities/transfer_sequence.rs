use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-year counter backing transfer-number generation. Incremented
/// inside the transaction that creates the header, so concurrent creates
/// cannot collide.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfer_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub year: i32,
    pub last_seq: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
