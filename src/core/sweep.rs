//! Daily global sweep.
//!
//! Once per calendar day one process advances every user's due recurring rows. The day
//! is claimed by inserting a row into `advancement_locks` whose primary key is derived
//! from the date; whichever instance inserts it first does the work, every other attempt
//! that day sees a unique constraint violation and backs off without touching the data.

use crate::{
    config::settings::SchedulerConfig,
    core::{
        clock::{Clock, SharedClock},
        date::format_date,
        recurrence::{AdvanceReport, AdvanceScope, advance},
    },
    entities::{AdvancementLock, advancement_lock},
    errors::Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{DatabaseConnection, EntityTrait, Set, SqlErr};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument};

/// Prefix of the per-day lock key.
const SWEEP_LOCK_PREFIX: &str = "sweep_";

/// Result of one sweep attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// This caller held the day's lock and ran the advancement
    Completed(AdvanceReport),
    /// Another caller already claimed the day; nothing was done
    AlreadyClaimed,
}

/// Lock key for the given day, e.g. `sweep_2024-02-01`.
#[must_use]
pub fn lock_key(day: NaiveDate) -> String {
    format!("{SWEEP_LOCK_PREFIX}{}", format_date(day))
}

/// Tries to claim `key`.
///
/// Returns `Ok(true)` if this call inserted the lock row, `Ok(false)` if it already
/// existed. Every other store failure is returned as an error.
pub async fn try_acquire_lock(
    db: &DatabaseConnection,
    key: &str,
    now: DateTime<Utc>,
) -> Result<bool> {
    let lock = advancement_lock::ActiveModel {
        id: Set(key.to_string()),
        created_at: Set(now),
    };

    match AdvancementLock::insert(lock).exec_without_returning(db).await {
        Ok(_) => Ok(true),
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Runs today's global advancement if no other caller has already claimed the day.
///
/// The lock is never released: a sweep that fails after claiming the day is not retried
/// until tomorrow. Inline advancement and queued jobs still cover individual users.
#[instrument(skip(db, clock))]
pub async fn run_daily_sweep(db: &DatabaseConnection, clock: &dyn Clock) -> Result<SweepOutcome> {
    let today = clock.today();
    let key = lock_key(today);

    if !try_acquire_lock(db, &key, clock.now()).await? {
        info!(lock_key = %key, "Daily sweep already claimed, skipping");
        return Ok(SweepOutcome::AlreadyClaimed);
    }

    let report = advance(db, AdvanceScope::All, today).await?;
    info!(
        lock_key = %key,
        promoted = report.promoted,
        created = report.created,
        "Daily sweep completed"
    );
    Ok(SweepOutcome::Completed(report))
}

/// Calls [`run_daily_sweep`] on a fixed interval until `shutdown` flips to `true`.
///
/// The first tick fires immediately, so a process started mid-day catches up at once.
/// Errors are logged and the loop keeps going.
pub async fn run_scheduler(
    db: Arc<DatabaseConnection>,
    clock: SharedClock,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(config.check_interval());
    info!(
        check_interval_secs = config.check_interval_secs,
        "Daily sweep scheduler started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_daily_sweep(&db, clock.as_ref()).await {
                    error!(day = %clock.today(), "Daily sweep failed: {e}");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Daily sweep scheduler stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::core::date::{Recurrence, parse_date};
    use crate::core::transaction::TransactionStatus;
    use crate::errors::Error;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, PaginatorTrait};
    use std::time::Duration;

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_lock_key_format() {
        assert_eq!(lock_key(day("2024-02-01")), "sweep_2024-02-01");
    }

    #[tokio::test]
    async fn test_lock_is_single_flight() -> Result<()> {
        let db = setup_test_db().await?;
        let now = Utc::now();

        assert!(try_acquire_lock(&db, "sweep_2024-02-01", now).await?);
        assert!(!try_acquire_lock(&db, "sweep_2024-02-01", now).await?);
        // A different day is a different lock
        assert!(try_acquire_lock(&db, "sweep_2024-02-02", now).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_lock_propagates_other_errors() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_errors([DbErr::Custom("disk I/O error".to_string())])
            .into_connection();

        let result = try_acquire_lock(&db, "sweep_2024-02-01", Utc::now()).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_daily_sweep_advances_all_users() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = create_test_user(&db, "alice@example.com").await?;
        let bob = create_test_user(&db, "bob@example.com").await?;
        create_custom_transaction(
            &db,
            &alice.id,
            "2024-01-15",
            TransactionStatus::Planned,
            Recurrence::Monthly,
            800.0,
        )
        .await?;
        create_custom_transaction(
            &db,
            &bob.id,
            "2024-01-31",
            TransactionStatus::Planned,
            Recurrence::Weekly,
            20.0,
        )
        .await?;

        let clock = FixedClock::at_date(day("2024-02-01"));
        let outcome = run_daily_sweep(&db, &clock).await?;

        assert_eq!(
            outcome,
            SweepOutcome::Completed(AdvanceReport {
                promoted: 2,
                created: 2,
            })
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_second_sweep_same_day_does_nothing() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        let clock = FixedClock::at_date(day("2024-02-01"));

        assert!(matches!(
            run_daily_sweep(&db, &clock).await?,
            SweepOutcome::Completed(_)
        ));

        // New due work appearing later the same day is left for tomorrow or other triggers
        create_custom_transaction(
            &db,
            &user.id,
            "2024-01-15",
            TransactionStatus::Planned,
            Recurrence::Monthly,
            800.0,
        )
        .await?;
        assert_eq!(run_daily_sweep(&db, &clock).await?, SweepOutcome::AlreadyClaimed);
        let count = crate::entities::Transaction::find().count(&db).await?;
        assert_eq!(count, 1);

        // Next day the lock key changes
        clock.advance(chrono::Duration::days(1));
        assert!(matches!(
            run_daily_sweep(&db, &clock).await?,
            SweepOutcome::Completed(AdvanceReport {
                promoted: 1,
                created: 1
            })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_sweeps_have_one_winner() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_custom_transaction(
            &db,
            &user.id,
            "2024-01-15",
            TransactionStatus::Planned,
            Recurrence::Monthly,
            800.0,
        )
        .await?;
        let clock = FixedClock::at_date(day("2024-02-01"));

        let (first, second) = tokio::join!(
            run_daily_sweep(&db, &clock),
            run_daily_sweep(&db, &clock)
        );
        let outcomes = [first?, second?];

        let winners = outcomes
            .iter()
            .filter(|o| matches!(o, SweepOutcome::Completed(_)))
            .count();
        assert_eq!(winners, 1);
        assert!(outcomes.contains(&SweepOutcome::AlreadyClaimed));

        let count = crate::entities::Transaction::find().count(&db).await?;
        assert_eq!(count, 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_scheduler_runs_then_stops() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_custom_transaction(
            &db,
            &user.id,
            "2024-01-15",
            TransactionStatus::Planned,
            Recurrence::Monthly,
            800.0,
        )
        .await?;
        let clock: SharedClock = Arc::new(FixedClock::at_date(day("2024-02-01")));
        let (tx, rx) = watch::channel(false);

        let db = Arc::new(db);
        let handle = tokio::spawn(run_scheduler(
            Arc::clone(&db),
            Arc::clone(&clock),
            SchedulerConfig {
                check_interval_secs: 1,
            },
            rx,
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let lock = AdvancementLock::find_by_id("sweep_2024-02-01")
            .one(db.as_ref())
            .await?;
        assert!(lock.is_some());
        let count = crate::entities::Transaction::find().count(db.as_ref()).await?;
        assert_eq!(count, 2);

        Ok(())
    }
}
