//! History command for per-day and per-month totals.
//!
//! This module implements `wd history` with week, month, and year periods,
//! an offset for browsing earlier periods, and human-readable or JSON output.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, Months, NaiveDate};
use serde::Serialize;
use wd_core::DaySummary;
use wd_db::Database;

use super::util::format_hours;

/// History period type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Week,
    Month,
    Year,
}

/// One line of the history table: a day, or a month for yearly history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryRow {
    pub label: String,
    pub work_seconds: i64,
    pub break_seconds: i64,
    pub overtime_seconds: i64,
}

impl HistoryRow {
    fn add(&mut self, summary: &DaySummary) {
        self.work_seconds += summary.total_work_seconds;
        self.break_seconds += summary.total_break_seconds;
        self.overtime_seconds += summary.total_overtime_seconds;
    }
}

/// Computed history data.
#[derive(Debug, Serialize)]
pub struct HistoryReport {
    pub period: Period,
    pub label: String,
    /// First day of the period.
    pub start: NaiveDate,
    /// Last day of the period (inclusive).
    pub end: NaiveDate,
    pub rows: Vec<HistoryRow>,
    pub totals: HistoryRow,
}

// ========== Period Date Calculation ==========

/// Calculates the half-open local date range for a period.
///
/// `offset` shifts by whole periods; -1 is the previous one.
pub fn period_range(period: Period, today: NaiveDate, offset: i32) -> Result<(NaiveDate, NaiveDate)> {
    let range = match period {
        Period::Week => {
            let days_since_monday = today.weekday().num_days_from_monday();
            let monday = today - Duration::days(i64::from(days_since_monday));
            let start = monday
                .checked_add_signed(Duration::weeks(i64::from(offset)))
                .context("week offset out of range")?;
            let end = start
                .checked_add_signed(Duration::days(7))
                .context("week offset out of range")?;
            (start, end)
        }
        Period::Month => {
            let first = today.with_day(1).context("invalid date")?;
            let start = shift_months(first, offset).context("month offset out of range")?;
            let end = shift_months(start, 1).context("month offset out of range")?;
            (start, end)
        }
        Period::Year => {
            let year = today
                .year()
                .checked_add(offset)
                .context("year offset out of range")?;
            let start = NaiveDate::from_ymd_opt(year, 1, 1).context("year out of range")?;
            let end = year
                .checked_add(1)
                .and_then(|next| NaiveDate::from_ymd_opt(next, 1, 1))
                .context("year out of range")?;
            (start, end)
        }
    };
    Ok(range)
}

fn shift_months(date: NaiveDate, offset: i32) -> Option<NaiveDate> {
    let months = Months::new(offset.unsigned_abs());
    if offset >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    }
}

fn period_label(period: Period, start: NaiveDate) -> String {
    match period {
        Period::Week => format!("Week of {}", start.format("%b %-d, %Y")),
        Period::Month => start.format("%B %Y").to_string(),
        Period::Year => start.year().to_string(),
    }
}

// ========== Report Generation ==========

/// Builds the history for a period relative to `today`.
pub fn build_report(
    db: &Database,
    period: Period,
    today: NaiveDate,
    offset: i32,
) -> Result<HistoryReport> {
    let (start, end) = period_range(period, today, offset)?;
    let summaries = db
        .day_summaries(start, end)
        .context("failed to load day summaries")?;

    let mut totals = HistoryRow {
        label: "TOTAL".to_string(),
        ..HistoryRow::default()
    };
    for summary in &summaries {
        totals.add(summary);
    }

    let rows = match period {
        Period::Year => group_by_month(start.year(), &summaries),
        Period::Week | Period::Month => summaries.iter().map(day_row).collect(),
    };

    Ok(HistoryReport {
        period,
        label: period_label(period, start),
        start,
        end: end - Duration::days(1),
        rows,
        totals,
    })
}

fn day_row(summary: &DaySummary) -> HistoryRow {
    let label = NaiveDate::parse_from_str(&summary.date_local, "%Y-%m-%d").map_or_else(
        |_| summary.date_local.clone(),
        |date| date.format("%a %Y-%m-%d").to_string(),
    );
    let mut row = HistoryRow {
        label,
        ..HistoryRow::default()
    };
    row.add(summary);
    row
}

/// Sums days into calendar months, in month order.
fn group_by_month(year: i32, summaries: &[DaySummary]) -> Vec<HistoryRow> {
    let mut months: BTreeMap<u32, HistoryRow> = BTreeMap::new();
    for summary in summaries {
        let Ok(date) = NaiveDate::parse_from_str(&summary.date_local, "%Y-%m-%d") else {
            tracing::warn!(date_local = %summary.date_local, "skipping unparseable date");
            continue;
        };
        months
            .entry(date.month())
            .or_insert_with(|| HistoryRow {
                label: NaiveDate::from_ymd_opt(year, date.month(), 1)
                    .map_or_else(String::new, |first| first.format("%B").to_string()),
                ..HistoryRow::default()
            })
            .add(summary);
    }
    months.into_values().collect()
}

// ========== Output ==========

fn write_row<W: Write>(writer: &mut W, label: &str, work: &str, brk: &str, overtime: &str) -> Result<()> {
    writeln!(writer, "{label:<16}{work:>6}  {brk:>6}  {overtime:>8}")?;
    Ok(())
}

/// Writes the human-readable history.
pub fn write_history<W: Write>(writer: &mut W, report: &HistoryReport) -> Result<()> {
    writeln!(writer, "HISTORY: {}", report.label)?;
    writeln!(writer)?;

    if report.rows.is_empty() {
        writeln!(writer, "No sessions recorded in this period.")?;
        return Ok(());
    }

    let first_column = match report.period {
        Period::Year => "MONTH",
        Period::Week | Period::Month => "DATE",
    };
    write_row(writer, first_column, "WORK", "BREAK", "OVERTIME")?;
    for row in &report.rows {
        write_summary_row(writer, row)?;
    }
    writeln!(writer)?;
    write_summary_row(writer, &report.totals)
}

fn write_summary_row<W: Write>(writer: &mut W, row: &HistoryRow) -> Result<()> {
    write_row(
        writer,
        &row.label,
        &format_hours(row.work_seconds),
        &format_hours(row.break_seconds),
        &format_hours(row.overtime_seconds),
    )
}

// ========== Public Interface ==========

/// Runs the history command.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    period: Period,
    offset: i32,
    json: bool,
) -> Result<()> {
    let today = Local::now().date_naive();
    let report = build_report(db, period, today, offset)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write_history(writer, &report)?;
    }
    Ok(())
}
