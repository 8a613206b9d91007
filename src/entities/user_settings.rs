//! User settings entity - Per-user preferences (savings goal, currency, language).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_settings")]
pub struct Model {
    /// Owner of these settings
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Target savings amount shown on the dashboard
    pub savings_goal: f64,
    /// ISO currency code used for display
    pub currency: String,
    /// Interface language code
    pub language: String,
}

/// Defines relationships between `UserSettings` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Settings belong to exactly one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
