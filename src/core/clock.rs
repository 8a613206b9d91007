//! Time source shared by every recurrence trigger.
//!
//! "Today" is the local civil date of the serving process. Inline advancement, the daily
//! sweep and the job worker all read it from the same [`Clock`], so they agree on which
//! rows are due.

use chrono::{DateTime, Local, NaiveDate, Utc};
use std::sync::{Arc, RwLock};

/// Source of the current instant and the current calendar date.
pub trait Clock: Send + Sync {
    /// Current instant, used for leases and audit timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Current calendar date used for due-ness comparisons.
    fn today(&self) -> NaiveDate;
}

/// Shared handle to a clock, cheap to clone into spawned tasks.
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time of the host; `today` is the local date, not the UTC date.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a given instant. `today` is the UTC date of that instant.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock that always reports `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Creates a clock reporting midnight UTC of `date`.
    #[must_use]
    pub fn at_date(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self
            .now
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = now;
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let next = self.now() + delta;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .now
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_fixed_clock_reports_pinned_date() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let clock = FixedClock::at_date(date);
        assert_eq!(clock.today(), date);

        clock.advance(chrono::Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_system_clock_today_is_local_date() {
        let clock = SystemClock;
        let before = Local::now().date_naive();
        let today = clock.today();
        let after = Local::now().date_naive();
        assert!(today == before || today == after);
    }
}
