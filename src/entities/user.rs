//! User entity - Account owning transactions and settings.
//!
//! Credentials live outside this crate; a user here is just an id, an email and a role.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Random UUID assigned at registration
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Normalised (trimmed, lowercase) email address
    #[sea_orm(unique)]
    pub email: String,
    /// `"client"` or `"admin"`
    pub role: String,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// Last successful login, if any
    pub last_login_at: Option<DateTimeUtc>,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many transactions
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transactions,
    /// One user has one settings row
    #[sea_orm(has_one = "super::user_settings::Entity")]
    Settings,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::user_settings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Settings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
