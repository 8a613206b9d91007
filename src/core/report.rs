//! Report generation business logic.
//!
//! This module provides the dashboard figures (actual vs planned totals) and the
//! category/trend report. All functions are framework-agnostic and return structured
//! data; aggregation happens in Rust over the user's rows.

use crate::{
    core::transaction::{TransactionStatus, TransactionType},
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{Datelike, Months, NaiveDate};
use sea_orm::{QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of months kept in the trend of an unfiltered report.
pub const DEFAULT_TREND_MONTHS: usize = 6;

/// Income and expense totals for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Completed income
    pub actual_income: f64,
    /// Completed expenses
    pub actual_expense: f64,
    /// All income, planned and completed
    pub planned_income: f64,
    /// All expenses, planned and completed
    pub planned_expense: f64,
}

/// Date window of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFilter {
    /// Whole history; the trend is cut to the latest six months
    All,
    /// One calendar year
    Year(i32),
    /// One calendar month (`month` is 1-12)
    Month {
        /// Calendar year
        year: i32,
        /// Month number, 1-12
        month: u32,
    },
    /// Inclusive date range
    Range {
        /// First day included
        start: NaiveDate,
        /// Last day included
        end: NaiveDate,
    },
}

impl ReportFilter {
    /// Inclusive bounds of the filter, `None` for [`ReportFilter::All`].
    pub fn bounds(self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let invalid = || Error::validation(format!("invalid report filter {self:?}"));
        match self {
            Self::All => Ok(None),
            Self::Year(year) => {
                let start = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
                let end = NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
                Ok(Some((start, end)))
            }
            Self::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
                let end = start
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(invalid)?;
                Ok(Some((start, end)))
            }
            Self::Range { start, end } if start <= end => Ok(Some((start, end))),
            Self::Range { .. } => Err(invalid()),
        }
    }
}

/// Income and expense totals of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Month as `YYYY-MM`
    pub name: String,
    /// Income booked or planned in the month
    pub incomes: f64,
    /// Expenses booked or planned in the month
    pub expenses: f64,
}

/// Category breakdown and monthly trend.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Expense totals per category
    pub expenses_by_category: BTreeMap<String, f64>,
    /// Income totals per category
    pub incomes_by_category: BTreeMap<String, f64>,
    /// Per-month totals in chronological order
    pub trend: Vec<TrendPoint>,
}

async fn user_rows(
    db: &DatabaseConnection,
    user_id: &str,
    bounds: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<transaction::Model>> {
    let mut query = Transaction::find().filter(transaction::Column::UserId.eq(user_id));
    if let Some((start, end)) = bounds {
        query = query.filter(transaction::Column::Date.between(start, end));
    }
    query
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

fn kind_of(row: &transaction::Model) -> Option<TransactionType> {
    row.transaction_type.parse().ok()
}

/// Computes the dashboard totals for a user.
///
/// "Actual" figures only count completed rows; "planned" figures count everything.
pub async fn get_stats(db: &DatabaseConnection, user_id: &str) -> Result<Stats> {
    let rows = user_rows(db, user_id, None).await?;
    Ok(summarize(&rows))
}

/// Folds rows into [`Stats`].
#[must_use]
pub fn summarize(rows: &[transaction::Model]) -> Stats {
    let completed = TransactionStatus::Completed.as_str();
    rows.iter().fold(Stats::default(), |mut stats, row| {
        let is_completed = row.status == completed;
        match kind_of(row) {
            Some(TransactionType::Income) => {
                stats.planned_income += row.amount;
                if is_completed {
                    stats.actual_income += row.amount;
                }
            }
            Some(TransactionType::Expense) => {
                stats.planned_expense += row.amount;
                if is_completed {
                    stats.actual_expense += row.amount;
                }
            }
            None => {}
        }
        stats
    })
}

/// Builds the category and trend report for a user.
pub async fn get_report(
    db: &DatabaseConnection,
    user_id: &str,
    filter: ReportFilter,
) -> Result<Report> {
    let bounds = filter.bounds()?;
    let rows = user_rows(db, user_id, bounds).await?;
    let mut report = build_report(&rows);

    if bounds.is_none() && report.trend.len() > DEFAULT_TREND_MONTHS {
        let skip = report.trend.len() - DEFAULT_TREND_MONTHS;
        report.trend.drain(..skip);
    }
    Ok(report)
}

/// Aggregates rows by category and by month.
#[must_use]
pub fn build_report(rows: &[transaction::Model]) -> Report {
    let mut report = Report::default();
    let mut months: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for row in rows {
        let Some(kind) = kind_of(row) else { continue };
        let month = format!("{:04}-{:02}", row.date.year(), row.date.month());
        let bucket = months.entry(month).or_default();

        match kind {
            TransactionType::Income => {
                *report
                    .incomes_by_category
                    .entry(row.category.clone())
                    .or_default() += row.amount;
                bucket.0 += row.amount;
            }
            TransactionType::Expense => {
                *report
                    .expenses_by_category
                    .entry(row.category.clone())
                    .or_default() += row.amount;
                bucket.1 += row.amount;
            }
        }
    }

    report.trend = months
        .into_iter()
        .map(|(name, (incomes, expenses))| TrendPoint {
            name,
            incomes,
            expenses,
        })
        .collect();
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::date::{Recurrence, parse_date};
    use crate::test_utils::*;

    fn day(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn test_month_bounds_handle_short_months() {
        let bounds = ReportFilter::Month {
            year: 2024,
            month: 2,
        }
        .bounds()
        .unwrap();
        assert_eq!(bounds, Some((day("2024-02-01"), day("2024-02-29"))));

        let bounds = ReportFilter::Month {
            year: 2023,
            month: 12,
        }
        .bounds()
        .unwrap();
        assert_eq!(bounds, Some((day("2023-12-01"), day("2023-12-31"))));
    }

    #[test]
    fn test_invalid_filters() {
        assert!(
            ReportFilter::Month {
                year: 2024,
                month: 13
            }
            .bounds()
            .is_err()
        );
        assert!(
            ReportFilter::Range {
                start: day("2024-02-01"),
                end: day("2024-01-01"),
            }
            .bounds()
            .is_err()
        );
        assert_eq!(ReportFilter::All.bounds().unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_stats_splits_actual_and_planned() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_typed_transaction(
            &db,
            &user.id,
            "income",
            "salary",
            2000.0,
            "2024-01-01",
            TransactionStatus::Completed,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "income",
            "salary",
            2000.0,
            "2024-02-01",
            TransactionStatus::Planned,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "rent",
            800.0,
            "2024-01-05",
            TransactionStatus::Completed,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "food",
            150.0,
            "2024-02-05",
            TransactionStatus::Planned,
        )
        .await?;

        let stats = get_stats(&db, &user.id).await?;
        assert_eq!(
            stats,
            Stats {
                actual_income: 2000.0,
                actual_expense: 800.0,
                planned_income: 4000.0,
                planned_expense: 950.0,
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_stats_empty_user() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        assert_eq!(get_stats(&db, &user.id).await?, Stats::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_report_month_filter() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "rent",
            800.0,
            "2024-02-01",
            TransactionStatus::Completed,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "food",
            40.0,
            "2024-02-29",
            TransactionStatus::Planned,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "food",
            60.0,
            "2024-02-10",
            TransactionStatus::Completed,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "income",
            "salary",
            2000.0,
            "2024-02-28",
            TransactionStatus::Completed,
        )
        .await?;
        create_typed_transaction(
            &db,
            &user.id,
            "expense",
            "rent",
            800.0,
            "2024-03-01",
            TransactionStatus::Planned,
        )
        .await?;

        let report = get_report(
            &db,
            &user.id,
            ReportFilter::Month {
                year: 2024,
                month: 2,
            },
        )
        .await?;

        assert_eq!(report.expenses_by_category.get("rent"), Some(&800.0));
        assert_eq!(report.expenses_by_category.get("food"), Some(&100.0));
        assert_eq!(report.incomes_by_category.get("salary"), Some(&2000.0));
        assert_eq!(
            report.trend,
            vec![TrendPoint {
                name: "2024-02".to_string(),
                incomes: 2000.0,
                expenses: 900.0,
            }]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_unfiltered_trend_keeps_latest_six_months() -> Result<()> {
        let (db, user) = setup_with_user().await?;
        for month in 1..=8 {
            let date = format!("2024-{month:02}-15");
            create_typed_transaction(
                &db,
                &user.id,
                "expense",
                "rent",
                100.0,
                &date,
                TransactionStatus::Completed,
            )
            .await?;
        }

        let report = get_report(&db, &user.id, ReportFilter::All).await?;
        let names: Vec<_> = report.trend.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["2024-03", "2024-04", "2024-05", "2024-06", "2024-07", "2024-08"]
        );
        // Category totals still cover the whole history
        assert_eq!(report.expenses_by_category.get("rent"), Some(&800.0));

        let year = get_report(&db, &user.id, ReportFilter::Year(2024)).await?;
        assert_eq!(year.trend.len(), 8);

        Ok(())
    }

    #[tokio::test]
    async fn test_report_ignores_other_users() -> Result<()> {
        let db = setup_test_db().await?;
        let alice = create_test_user(&db, "alice@example.com").await?;
        let bob = create_test_user(&db, "bob@example.com").await?;
        create_custom_transaction(
            &db,
            &bob.id,
            "2024-01-01",
            TransactionStatus::Completed,
            Recurrence::None,
            99.0,
        )
        .await?;

        let report = get_report(&db, &alice.id, ReportFilter::All).await?;
        assert_eq!(report, Report::default());

        Ok(())
    }
}
