//! Background job queue and its polling worker.
//!
//! Jobs live in the `background_jobs` table. A worker tick:
//! 1. reclaims `processing` jobs whose lease expired (back to `pending`, or `failed`
//!    when they already used up their attempts),
//! 2. leases a bounded batch of `pending` jobs, one conditional update per job so two
//!    workers can never claim the same row,
//! 3. executes the leased jobs concurrently,
//! 4. settles each one: deleted on success, otherwise retried or marked `failed`. A
//!    settle only applies while the job is still held under the same lease.
//!
//! A worker that dies mid-job leaves the row `processing`; once its lease runs out any
//! other worker picks it up again. Jobs are restartable, not resumable.

use crate::{
    config::settings::WorkerConfig,
    core::{
        clock::{Clock, SharedClock},
        recurrence::{AdvanceReport, AdvanceScope, advance},
    },
    entities::{BackgroundJob, background_job},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Error text stored on jobs whose lease ran out.
const LEASE_EXPIRED: &str = "lease expired";

/// Kinds of work the worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Advance one user's recurring transactions
    ProcessRecurring,
}

impl JobKind {
    /// Type tag stored in `background_jobs.job_type`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProcessRecurring => "PROCESS_RECURRING",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PROCESS_RECURRING" => Ok(Self::ProcessRecurring),
            other => Err(Error::UnknownJobType {
                job_type: other.to_string(),
            }),
        }
    }
}

/// Queue state of a job row. Finished jobs are deleted, so there is no `done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting to be leased
    Pending,
    /// Leased by a worker until `locked_until`
    Processing,
    /// Gave up; kept for inspection
    Failed,
}

impl JobStatus {
    /// Storage form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Failed => "failed",
        }
    }
}

/// Payload of a [`JobKind::ProcessRecurring`] job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringJobPayload {
    /// User whose recurring rows should be advanced
    pub user_id: String,
}

/// What happened to a job after it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSettlement {
    /// Succeeded and removed from the queue
    Completed,
    /// Failed and put back to `pending`
    Retrying,
    /// Failed for good
    Failed,
    /// The lease ran out and the job now belongs to someone else; nothing was written
    LeaseLost,
}

/// Counts from [`reclaim_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    /// Expired jobs reset to `pending`
    pub requeued: u64,
    /// Expired jobs that had no attempts left
    pub failed: u64,
}

/// Summary of one worker tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Expired leases handled at the start of the tick
    pub reclaimed: ReclaimReport,
    /// Jobs leased by this tick
    pub leased: usize,
    /// Jobs that succeeded and were deleted
    pub completed: usize,
    /// Jobs put back for another attempt
    pub retried: usize,
    /// Jobs marked `failed`
    pub failed: usize,
    /// Jobs whose lease expired before they were settled
    pub lost: usize,
}

impl TickReport {
    const fn record(&mut self, settlement: JobSettlement) {
        match settlement {
            JobSettlement::Completed => self.completed += 1,
            JobSettlement::Retrying => self.retried += 1,
            JobSettlement::Failed => self.failed += 1,
            JobSettlement::LeaseLost => self.lost += 1,
        }
    }
}

/// Adds a job to the queue.
pub async fn enqueue<P: Serialize + Sync>(
    db: &DatabaseConnection,
    kind: JobKind,
    payload: &P,
) -> Result<background_job::Model> {
    let job = background_job::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        job_type: Set(kind.as_str().to_string()),
        payload: Set(serde_json::to_value(payload)?),
        status: Set(JobStatus::Pending.as_str().to_string()),
        attempts: Set(0),
        locked_until: Set(None),
        last_error: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;

    debug!(job_id = %job.id, job_type = %kind, "Enqueued job");
    Ok(job)
}

/// Queues recurrence advancement for one user.
pub async fn enqueue_recurring(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<background_job::Model> {
    let payload = RecurringJobPayload {
        user_id: user_id.to_string(),
    };
    enqueue(db, JobKind::ProcessRecurring, &payload).await
}

/// Handles `processing` jobs whose lease ended before `now`.
///
/// Jobs with `attempts >= max_attempts` are marked `failed`; the rest go back to
/// `pending` and are leased again like any new job.
pub async fn reclaim_expired(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    max_attempts: i32,
) -> Result<ReclaimReport> {
    let expired = || {
        background_job::Column::Status
            .eq(JobStatus::Processing.as_str())
            .and(background_job::Column::LockedUntil.lt(now))
    };

    let failed = BackgroundJob::update_many()
        .col_expr(
            background_job::Column::Status,
            Expr::value(JobStatus::Failed.as_str()),
        )
        .col_expr(
            background_job::Column::LockedUntil,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(background_job::Column::LastError, Expr::value(LEASE_EXPIRED))
        .filter(expired())
        .filter(background_job::Column::Attempts.gte(max_attempts))
        .exec(db)
        .await?
        .rows_affected;

    let requeued = BackgroundJob::update_many()
        .col_expr(
            background_job::Column::Status,
            Expr::value(JobStatus::Pending.as_str()),
        )
        .col_expr(
            background_job::Column::LockedUntil,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(background_job::Column::LastError, Expr::value(LEASE_EXPIRED))
        .filter(expired())
        .exec(db)
        .await?
        .rows_affected;

    if requeued > 0 || failed > 0 {
        warn!(requeued, failed, "Reclaimed jobs with expired leases");
    }
    Ok(ReclaimReport { requeued, failed })
}

/// Leases up to `batch_size` pending jobs, oldest first.
///
/// Each candidate is claimed with a single update guarded by `status = 'pending'`; a
/// candidate another worker claimed in between is skipped. Returned models reflect the
/// claim (`processing`, bumped `attempts`, `locked_until = now + lease`).
pub async fn lease_batch(
    db: &DatabaseConnection,
    now: DateTime<Utc>,
    lease: chrono::Duration,
    batch_size: u64,
) -> Result<Vec<background_job::Model>> {
    let locked_until = now.checked_add_signed(lease).unwrap_or(DateTime::<Utc>::MAX_UTC);

    let candidates = BackgroundJob::find()
        .filter(background_job::Column::Status.eq(JobStatus::Pending.as_str()))
        .order_by_asc(background_job::Column::CreatedAt)
        .limit(batch_size)
        .all(db)
        .await?;

    let mut leased = Vec::with_capacity(candidates.len());
    for mut job in candidates {
        let claimed = BackgroundJob::update_many()
            .col_expr(
                background_job::Column::Status,
                Expr::value(JobStatus::Processing.as_str()),
            )
            .col_expr(
                background_job::Column::LockedUntil,
                Expr::value(Some(locked_until)),
            )
            .col_expr(
                background_job::Column::Attempts,
                Expr::col(background_job::Column::Attempts).add(1),
            )
            .filter(background_job::Column::Id.eq(job.id.as_str()))
            .filter(background_job::Column::Status.eq(JobStatus::Pending.as_str()))
            .exec(db)
            .await?
            .rows_affected;

        if claimed == 1 {
            job.status = JobStatus::Processing.as_str().to_string();
            job.locked_until = Some(locked_until);
            job.attempts += 1;
            leased.push(job);
        } else {
            debug!(job_id = %job.id, "Job claimed by another worker");
        }
    }

    Ok(leased)
}

/// Runs a leased job.
#[instrument(skip(db, clock, job), fields(job_id = %job.id, job_type = %job.job_type))]
pub async fn execute(
    db: &DatabaseConnection,
    clock: &dyn Clock,
    job: &background_job::Model,
) -> Result<AdvanceReport> {
    match job.job_type.parse::<JobKind>()? {
        JobKind::ProcessRecurring => {
            let payload: RecurringJobPayload = serde_json::from_value(job.payload.clone())?;
            advance(db, AdvanceScope::User(&payload.user_id), clock.today()).await
        }
    }
}

/// Matches `job` only while it is still held under the lease it was run with.
///
/// Every lease bumps `attempts`, so a job reclaimed and leased again by another worker
/// no longer matches.
fn held_lease(job: &background_job::Model) -> Condition {
    Condition::all()
        .add(background_job::Column::Id.eq(job.id.as_str()))
        .add(background_job::Column::Status.eq(JobStatus::Processing.as_str()))
        .add(background_job::Column::Attempts.eq(job.attempts))
}

/// Records the outcome of a job run.
///
/// Success deletes the row. A failure is retried unless the job used up its attempts or
/// the error cannot go away on its own (unknown type, bad payload); then it is `failed`.
/// If the lease expired in the meantime the row is left alone and
/// [`JobSettlement::LeaseLost`] is returned.
pub async fn settle(
    db: &DatabaseConnection,
    job: &background_job::Model,
    outcome: &Result<AdvanceReport>,
    max_attempts: i32,
) -> Result<JobSettlement> {
    let error = match outcome {
        Ok(_) => {
            let deleted = BackgroundJob::delete_many()
                .filter(held_lease(job))
                .exec(db)
                .await?
                .rows_affected;
            return Ok(if deleted == 1 {
                JobSettlement::Completed
            } else {
                lease_lost(job)
            });
        }
        Err(e) => e,
    };

    let settlement = if job.attempts >= max_attempts || !error.is_retryable() {
        JobSettlement::Failed
    } else {
        JobSettlement::Retrying
    };
    let status = match settlement {
        JobSettlement::Failed => JobStatus::Failed,
        _ => JobStatus::Pending,
    };

    let updated = BackgroundJob::update_many()
        .col_expr(background_job::Column::Status, Expr::value(status.as_str()))
        .col_expr(
            background_job::Column::LockedUntil,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(
            background_job::Column::LastError,
            Expr::value(error.to_string()),
        )
        .filter(held_lease(job))
        .exec(db)
        .await?
        .rows_affected;

    Ok(if updated == 1 {
        settlement
    } else {
        lease_lost(job)
    })
}

fn lease_lost(job: &background_job::Model) -> JobSettlement {
    warn!(job_id = %job.id, attempts = job.attempts, "Lease lost before settling job");
    JobSettlement::LeaseLost
}

/// Polling worker draining the job queue.
pub struct JobWorker {
    db: Arc<DatabaseConnection>,
    clock: SharedClock,
    config: WorkerConfig,
}

impl JobWorker {
    /// Creates a worker over `db`.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        clock: SharedClock,
        config: WorkerConfig,
    ) -> Self {
        Self { db, clock, config }
    }

    /// One reclaim, lease, execute, settle cycle.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let mut report = TickReport {
            reclaimed: reclaim_expired(&self.db, now, self.config.max_attempts).await?,
            ..TickReport::default()
        };

        let jobs = lease_batch(&self.db, now, self.config.lease(), self.config.batch_size).await?;
        report.leased = jobs.len();

        let mut running = JoinSet::new();
        for job in jobs {
            let db = Arc::clone(&self.db);
            let clock = Arc::clone(&self.clock);
            running.spawn(async move {
                let outcome = execute(&db, clock.as_ref(), &job).await;
                (job, outcome)
            });
        }

        while let Some(joined) = running.join_next().await {
            let (job, outcome) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // Lease expiry brings the job back
                    error!("Job task aborted: {e}");
                    continue;
                }
            };

            if let Err(e) = &outcome {
                error!(job_id = %job.id, attempts = job.attempts, "Job failed: {e}");
            }

            match settle(&self.db, &job, &outcome, self.config.max_attempts).await {
                Ok(settlement) => report.record(settlement),
                Err(e) => error!(job_id = %job.id, "Failed to settle job: {e}"),
            }
        }

        if report.leased > 0 {
            info!(
                leased = report.leased,
                completed = report.completed,
                retried = report.retried,
                failed = report.failed,
                lost = report.lost,
                "Worker tick finished"
            );
        }
        Ok(report)
    }

    /// Ticks every `poll_interval_secs` until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            batch_size = self.config.batch_size,
            "Job worker started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Job worker tick failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Job worker stopped");
    }
}
