//! Framework-agnostic business logic.
//!
//! The recurrence engine is split across [`date`] (pure date projection),
//! [`recurrence`] (the advancement protocol) and its three triggers: inline advancement in
//! [`transaction::list_transactions`], the daily [`sweep`] and the [`jobs`] worker.

pub mod clock;
pub mod date;
pub mod jobs;
pub mod recurrence;
pub mod report;
pub mod settings;
pub mod sweep;
pub mod transaction;
pub mod user;
