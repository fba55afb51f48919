use crate::error::{Result, RollupError};
use crate::schema::MonthKey;
use chrono::{Datelike, Days, NaiveDate};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

pub fn first_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Every calendar month touched by `[start, end]`, in order.
pub fn month_keys_in_period(start: NaiveDate, end: NaiveDate) -> Vec<MonthKey> {
    let mut keys = Vec::new();
    if end < start {
        return keys;
    }

    let last = MonthKey::from_date(end);
    let mut current = MonthKey::from_date(start);
    while current <= last {
        keys.push(current);
        current = current.next();
    }

    keys
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_date, end_date)
pub fn parse_period_string(period: &str) -> Result<(NaiveDate, NaiveDate)> {
    let parts: Vec<&str> = period.split(':').collect();

    match parts.len() {
        1 => {
            let start_date = parse_month_start(parts[0], "")?;
            let end_date = last_day_of_month(start_date.year(), start_date.month());
            Ok((start_date, end_date))
        }
        2 => {
            let start_date = parse_month_start(parts[0], "start ")?;
            let end_ref = parse_month_start(parts[1], "end ")?;
            let end_date = last_day_of_month(end_ref.year(), end_ref.month());
            Ok((start_date, end_date))
        }
        _ => Err(RollupError::DateError(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}

fn parse_month_start(part: &str, which: &str) -> Result<NaiveDate> {
    let text = format!("{}-01", part.trim());
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| {
        RollupError::DateError(format!(
            "Invalid {}date format in period: {}. Expected YYYY-MM",
            which, part
        ))
    })
}

/// Accepts "YYYY-MM-DD", a full RFC 3339 timestamp, or "DD/MM/YYYY".
pub fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(ts.date_naive());
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(text, "%d/%m/%Y").ok()
}
