//! Background job entity - Queued unit of deferred work leased by the job worker.
//!
//! Lifecycle: `pending` -> `processing` (leased until `locked_until`) -> deleted on success,
//! back to `pending` on a retryable failure or an expired lease, `failed` once `attempts`
//! reaches the retry ceiling.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Background job database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "background_jobs")]
pub struct Model {
    /// Random UUID assigned at enqueue time
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Job kind tag, e.g. `"PROCESS_RECURRING"`
    pub job_type: String,
    /// Structured job arguments (`{"userId": ...}` for recurrence jobs)
    pub payload: Json,
    /// `"pending"`, `"processing"` or `"failed"`
    pub status: String,
    /// Number of times the job has been leased
    pub attempts: i32,
    /// End of the current lease; `None` when not leased
    pub locked_until: Option<DateTimeUtc>,
    /// Error text from the most recent failed attempt
    pub last_error: Option<String>,
    /// When the job was enqueued
    pub created_at: DateTimeUtc,
}

/// `BackgroundJob` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
