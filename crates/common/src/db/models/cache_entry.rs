//! Cache entry entity
//!
//! Backing table for the relational cache store. Rows are overwritten on
//! demand and removed by prefix-delete or the periodic expiry sweep.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cache_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub key: String,

    /// Opaque structured value
    pub payload: Json,

    pub created_at: DateTimeWithTimeZone,

    /// Always strictly later than created_at
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
