//! Transaction business logic - Handles all transaction-related operations.
//!
//! Every operation is scoped to the owning user; asking for someone else's transaction
//! behaves exactly like asking for one that does not exist. Listing a user's
//! transactions first advances that user's due recurring rows, as a best-effort safety
//! net behind the daily sweep and the job worker.

use crate::{
    core::{
        clock::Clock,
        date::{Recurrence, next_date},
        recurrence::{AdvanceScope, advance},
    },
    entities::{Transaction, User, transaction},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Direction of money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in
    Income,
    /// Money going out
    Expense,
}

impl TransactionType {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(Error::validation(format!("unknown transaction type '{other}'"))),
        }
    }
}

/// Whether a transaction has happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Scheduled for its date, not yet booked
    Planned,
    /// Booked
    Completed,
}

impl TransactionStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "planned" => Ok(Self::Planned),
            "completed" => Ok(Self::Completed),
            other => Err(Error::validation(format!(
                "unknown transaction status '{other}'"
            ))),
        }
    }
}

/// User-supplied fields of a transaction, used for both create and update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Income or expense
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// Category key, must not be blank
    pub category: String,
    /// Positive, finite amount
    pub amount: f64,
    /// Optional note
    #[serde(default)]
    pub description: Option<String>,
    /// Date the transaction applies to
    pub date: NaiveDate,
    /// Planned or completed
    pub status: TransactionStatus,
    /// Recurrence rule, `none` when omitted
    #[serde(default)]
    pub recurrence: Recurrence,
}

impl NewTransaction {
    /// Checks the amount and category.
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::InvalidAmount {
                amount: self.amount,
            });
        }
        if self.category.trim().is_empty() {
            return Err(Error::validation("category is required"));
        }
        Ok(())
    }
}

/// Pagination for [`list_transactions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows returned
    pub limit: u64,
    /// Rows skipped before the first returned one
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Creates a transaction for `user_id`.
///
/// A transaction entered as already `completed` with a recurrence rule also gets its
/// `planned` successor right away, so the series continues without waiting for a
/// trigger. Both rows are written in one database transaction.
#[instrument(skip(db, new), fields(date = %new.date, recurrence = %new.recurrence))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    new: NewTransaction,
) -> Result<transaction::Model> {
    new.validate()?;

    let txn = db.begin().await?;

    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            id: user_id.to_string(),
        })?;

    let now = Utc::now();
    let model = transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(user_id.to_string()),
        transaction_type: Set(new.transaction_type.as_str().to_string()),
        category: Set(new.category.trim().to_string()),
        amount: Set(new.amount),
        description: Set(new.description.clone()),
        date: Set(new.date),
        status: Set(new.status.as_str().to_string()),
        recurrence: Set(new.recurrence.as_str().to_string()),
        is_modified: Set(false),
        created_at: Set(now),
    };
    let created = model.clone().insert(&txn).await?;

    if new.recurrence.is_recurring() && new.status == TransactionStatus::Completed {
        let successor = transaction::ActiveModel {
            id: Set(Uuid::new_v4().to_string()),
            date: Set(next_date(new.date, new.recurrence)?),
            status: Set(TransactionStatus::Planned.as_str().to_string()),
            ..model
        };
        successor.insert(&txn).await?;
    }

    txn.commit().await?;

    info!(transaction_id = %created.id, "Created transaction");
    Ok(created)
}

/// Retrieves one of the user's transactions by id.
pub async fn get_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: &str,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a page of the user's transactions, newest date first.
///
/// Due recurring rows of this user are advanced first. That advancement is best
/// effort: a failure is logged and the listing still succeeds.
pub async fn list_transactions(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    user_id: &str,
    page: Page,
) -> Result<Vec<transaction::Model>> {
    if let Err(e) = advance(db, AdvanceScope::User(user_id), clock.today()).await {
        warn!(user_id, error = %e, "Inline recurrence advancement failed");
    }

    Transaction::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::CreatedAt)
        .limit(page.limit)
        .offset(page.offset)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Replaces the fields of one of the user's transactions and marks it as modified.
#[instrument(skip(db, changes))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: &str,
    changes: NewTransaction,
) -> Result<transaction::Model> {
    changes.validate()?;

    let existing = get_transaction(db, user_id, transaction_id)
        .await?
        .ok_or_else(|| Error::TransactionNotFound {
            id: transaction_id.to_string(),
        })?;

    let mut active_model: transaction::ActiveModel = existing.into();
    active_model.transaction_type = Set(changes.transaction_type.as_str().to_string());
    active_model.category = Set(changes.category.trim().to_string());
    active_model.amount = Set(changes.amount);
    active_model.description = Set(changes.description);
    active_model.date = Set(changes.date);
    active_model.status = Set(changes.status.as_str().to_string());
    active_model.recurrence = Set(changes.recurrence.as_str().to_string());
    active_model.is_modified = Set(true);

    active_model.update(db).await.map_err(Into::into)
}

/// Deletes one of the user's transactions.
///
/// Deleting the trailing `planned` row of a recurring series ends the series.
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    user_id: &str,
    transaction_id: &str,
) -> Result<()> {
    let result = Transaction::delete_many()
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::TransactionNotFound {
            id: transaction_id.to_string(),
        });
    }
    Ok(())
}
