//! Transaction entity - Represents every income or expense a user logs.
//!
//! Rows are either entered by hand or generated as the successor of a recurring row.
//! `status` is `"planned"` or `"completed"`, `recurrence` is one of `"none"`, `"daily"`,
//! `"weekly"`, `"monthly"` or `"yearly"`. There is no series table: a recurring series is
//! simply the chain of rows that each advanced planned row leaves behind.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Random UUID assigned at creation, never reused
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Owner of the transaction
    pub user_id: String,
    /// `"income"` or `"expense"`
    #[sea_orm(column_name = "type")]
    pub transaction_type: String,
    /// Free-form category key (e.g. `"rent"`, `"salary"`)
    pub category: String,
    /// Always positive; the direction comes from `transaction_type`
    pub amount: f64,
    /// Optional note entered by the user
    pub description: Option<String>,
    /// Calendar date the transaction applies to
    pub date: Date,
    /// `"planned"` or `"completed"`
    pub status: String,
    /// Recurrence rule, `"none"` for one-off rows
    pub recurrence: String,
    /// Set once the user hand-edits the row
    pub is_modified: bool,
    /// When the row was inserted
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one user
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
