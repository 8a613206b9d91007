//! Advancement lock entity - One row per calendar day claimed by the global sweep.
//!
//! The primary key is the day-derived lock key (`sweep_YYYY-MM-DD`), so a second insert
//! for the same day fails with a unique constraint violation. Rows are never deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Advancement lock database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "advancement_locks")]
pub struct Model {
    /// Lock key, e.g. `"sweep_2024-02-01"`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// When the winning sweep claimed the day
    pub created_at: DateTimeUtc,
}

/// `AdvancementLock` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
