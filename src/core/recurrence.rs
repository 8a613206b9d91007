//! Recurrence advancement - promotes due planned transactions and spawns their successors.
//!
//! A transaction is *due* when it is `planned`, has a recurrence rule other than `none`
//! and its date is on or before "today". Advancing a due row inserts exactly one
//! `planned` successor dated [`next_date`] and flips the row to `completed`.
//!
//! Successors are not checked for due-ness: a successor that is already in the past is
//! left `planned` and picked up by the next call. Every call therefore does exactly
//! `|due|` insertions and terminates, and a row is never promoted in the call that
//! created it. Selection, insertion and promotion share one database transaction, so a
//! crash or store error before commit leaves no successor behind and a retry starts
//! from the same due set.

use crate::{
    core::{
        date::{Recurrence, next_date},
        transaction::TransactionStatus,
    },
    entities::{Transaction, transaction},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    Condition, DatabaseConnection, QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Which owners an advancement call touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceScope<'a> {
    /// Only rows owned by this user
    User(&'a str),
    /// Every user (daily sweep)
    All,
}

/// Counts returned by [`advance`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdvanceReport {
    /// Rows flipped from `planned` to `completed`
    pub promoted: u64,
    /// Successor rows inserted
    pub created: u64,
}

impl AdvanceReport {
    /// True when the call found nothing to do.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.promoted == 0 && self.created == 0
    }
}

fn due_condition(scope: AdvanceScope<'_>, today: NaiveDate) -> Condition {
    let condition = Condition::all()
        .add(transaction::Column::Status.eq(TransactionStatus::Planned.as_str()))
        .add(transaction::Column::Recurrence.ne(Recurrence::None.as_str()))
        .add(transaction::Column::Date.lte(today));

    match scope {
        AdvanceScope::User(user_id) => condition.add(transaction::Column::UserId.eq(user_id)),
        AdvanceScope::All => condition,
    }
}

/// Lists the due transactions in `scope`, oldest first.
pub async fn find_due<C>(
    db: &C,
    scope: AdvanceScope<'_>,
    today: NaiveDate,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(due_condition(scope, today))
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Builds the `planned` successor of `row` with a fresh id.
///
/// Fails with a validation error if the stored recurrence rule is unknown or the next
/// date is out of range.
pub fn successor_of(
    row: &transaction::Model,
    created_at: DateTime<Utc>,
) -> Result<transaction::ActiveModel> {
    let rule = row.recurrence.parse::<Recurrence>()?;
    let date = next_date(row.date, rule)?;

    Ok(transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(row.user_id.clone()),
        transaction_type: Set(row.transaction_type.clone()),
        category: Set(row.category.clone()),
        amount: Set(row.amount),
        description: Set(row.description.clone()),
        date: Set(date),
        status: Set(TransactionStatus::Planned.as_str().to_string()),
        recurrence: Set(rule.as_str().to_string()),
        is_modified: Set(false),
        created_at: Set(created_at),
    })
}

async fn create_successors<C>(
    db: &C,
    due: &[transaction::Model],
    created_at: DateTime<Utc>,
) -> Result<u64>
where
    C: ConnectionTrait,
{
    if due.is_empty() {
        return Ok(0);
    }

    let successors = due
        .iter()
        .map(|row| successor_of(row, created_at))
        .collect::<Result<Vec<_>>>()?;

    Transaction::insert_many(successors)
        .exec_without_returning(db)
        .await
        .map_err(Into::into)
}

async fn promote_due<C>(
    db: &C,
    scope: AdvanceScope<'_>,
    today: NaiveDate,
    due: &[transaction::Model],
) -> Result<u64>
where
    C: ConnectionTrait,
{
    let ids: Vec<&str> = due.iter().map(|row| row.id.as_str()).collect();

    let result = Transaction::update_many()
        .col_expr(
            transaction::Column::Status,
            Expr::value(TransactionStatus::Completed.as_str()),
        )
        .filter(due_condition(scope, today))
        .filter(transaction::Column::Id.is_in(ids))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Advances every due transaction in `scope` as of `today`.
///
/// Returns `{promoted: 0, created: 0}` when nothing is due. Calling it again for the
/// same `today` after a success is a no-op. Any store error aborts the call and rolls
/// back everything it did.
#[instrument(skip(db))]
pub async fn advance(
    db: &DatabaseConnection,
    scope: AdvanceScope<'_>,
    today: NaiveDate,
) -> Result<AdvanceReport> {
    let txn = db.begin().await?;

    let due = find_due(&txn, scope, today).await?;
    if due.is_empty() {
        debug!("No due recurring transactions");
        return Ok(AdvanceReport::default());
    }

    let created = create_successors(&txn, &due, Utc::now()).await?;
    let promoted = promote_due(&txn, scope, today, &due).await?;

    txn.commit().await?;

    info!(promoted, created, "Advanced recurring transactions");
    Ok(AdvanceReport { promoted, created })
}
