//! Date projection for recurring transactions.
//!
//! Dates are plain calendar dates in the proleptic Gregorian calendar; no time zone is
//! ever involved. Monthly and yearly steps clamp to the last day of the target month,
//! so Jan 31 becomes Feb 28/29 and Feb 29 becomes Feb 28 in non-leap years.

use crate::errors::{Error, Result};
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage and wire format of calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How often a transaction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    /// One-off transaction, never spawns successors
    #[default]
    None,
    /// Every day
    Daily,
    /// Every seven days
    Weekly,
    /// Same day of the next month, clamped to month end
    Monthly,
    /// Same month and day of the next year, clamped to month end
    Yearly,
}

impl Recurrence {
    /// Storage representation of the rule.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    /// Whether rows with this rule spawn successors.
    #[must_use]
    pub const fn is_recurring(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            other => Err(Error::validation(format!(
                "unknown recurrence rule '{other}'"
            ))),
        }
    }
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(Error::validation(format!(
            "date '{s}' must be in YYYY-MM-DD format"
        )));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| Error::validation(format!("invalid date '{s}': {e}")))
}

/// Formats a date in storage format.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Computes the occurrence following `date` under `rule`.
///
/// `Recurrence::None` returns `date` unchanged. Fails only if the result would fall
/// outside the representable calendar range.
pub fn next_date(date: NaiveDate, rule: Recurrence) -> Result<NaiveDate> {
    let next = match rule {
        Recurrence::None => Some(date),
        Recurrence::Daily => date.checked_add_days(Days::new(1)),
        Recurrence::Weekly => date.checked_add_days(Days::new(7)),
        // chrono clamps to the last day of the target month
        Recurrence::Monthly => date.checked_add_months(Months::new(1)),
        Recurrence::Yearly => date.checked_add_months(Months::new(12)),
    };
    next.ok_or_else(|| Error::validation(format!("{rule} step from {date} is out of range")))
}

/// String-level projection: `project("2024-01-31", "monthly") == "2024-02-29"`.
pub fn project(date: &str, rule: &str) -> Result<String> {
    let date = parse_date(date)?;
    let rule = rule.parse::<Recurrence>()?;
    next_date(date, rule).map(format_date)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_monthly_clamps_to_leap_february() {
        assert_eq!(next_date(d("2024-01-31"), Recurrence::Monthly).unwrap(), d("2024-02-29"));
    }

    #[test]
    fn test_monthly_clamps_to_common_february() {
        assert_eq!(next_date(d("2023-01-31"), Recurrence::Monthly).unwrap(), d("2023-02-28"));
    }

    #[test]
    fn test_monthly_other_month_ends() {
        assert_eq!(next_date(d("2024-03-31"), Recurrence::Monthly).unwrap(), d("2024-04-30"));
        assert_eq!(next_date(d("2024-12-31"), Recurrence::Monthly).unwrap(), d("2025-01-31"));
        assert_eq!(next_date(d("2024-02-29"), Recurrence::Monthly).unwrap(), d("2024-03-29"));
        assert_eq!(next_date(d("2024-05-15"), Recurrence::Monthly).unwrap(), d("2024-06-15"));
    }

    #[test]
    fn test_yearly_clamps_leap_day() {
        assert_eq!(next_date(d("2024-02-29"), Recurrence::Yearly).unwrap(), d("2025-02-28"));
        assert_eq!(next_date(d("2023-02-28"), Recurrence::Yearly).unwrap(), d("2024-02-28"));
        assert_eq!(next_date(d("2024-07-04"), Recurrence::Yearly).unwrap(), d("2025-07-04"));
    }

    #[test]
    fn test_simple_increments() {
        assert_eq!(next_date(d("2024-06-15"), Recurrence::Daily).unwrap(), d("2024-06-16"));
        assert_eq!(next_date(d("2024-06-15"), Recurrence::Weekly).unwrap(), d("2024-06-22"));
        assert_eq!(next_date(d("2024-12-31"), Recurrence::Daily).unwrap(), d("2025-01-01"));
        assert_eq!(next_date(d("2024-02-26"), Recurrence::Weekly).unwrap(), d("2024-03-04"));
    }

    #[test]
    fn test_none_is_identity() {
        for s in ["2024-01-31", "2024-02-29", "1999-12-31", "2100-03-01"] {
            assert_eq!(next_date(d(s), Recurrence::None).unwrap(), d(s));
        }
    }

    #[test]
    fn test_out_of_range_is_validation_error() {
        let result = next_date(NaiveDate::MAX, Recurrence::Daily);
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_project_strings() {
        assert_eq!(project("2024-01-31", "monthly").unwrap(), "2024-02-29");
        assert_eq!(project("2024-02-29", "yearly").unwrap(), "2025-02-28");
        assert_eq!(project("2024-06-15", "none").unwrap(), "2024-06-15");
    }

    #[test]
    fn test_malformed_dates_rejected() {
        for bad in ["2024-1-31", "2024/01/31", "31-01-2024", "2024-02-30", "", "2024-01-31T00:00"] {
            let result = project(bad, "monthly");
            assert!(
                matches!(result, Err(Error::Validation { .. })),
                "expected validation error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let result = project("2024-01-31", "fortnightly");
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_recurrence_round_trips_storage_names() {
        for rule in [
            Recurrence::None,
            Recurrence::Daily,
            Recurrence::Weekly,
            Recurrence::Monthly,
            Recurrence::Yearly,
        ] {
            assert_eq!(rule.as_str().parse::<Recurrence>().unwrap(), rule);
        }
        assert!(!Recurrence::None.is_recurring());
        assert!(Recurrence::Monthly.is_recurring());
    }
}
