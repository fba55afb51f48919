//! Fixed-locale (pt-BR) presentation formatters.
//!
//! All functions are pure. Currency is always rendered as BRL with two
//! decimals, `.` as the thousands separator and `,` as the decimal separator.

use crate::schema::{round_money, MonthKey};
use chrono::NaiveDate;
use rust_decimal::Decimal;

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "fev", "mar", "abr", "mai", "jun", "jul", "ago", "set", "out", "nov", "dez",
];

/// Formats an amount as Brazilian Real, e.g. `R$ 1.234,56` or `-R$ 82,83`.
pub fn format_currency(amount: Decimal) -> String {
    let body = format_decimal_ptbr(amount.abs(), 2);
    if amount.is_sign_negative() && !round_money(amount, 2).is_zero() {
        format!("-R$ {}", body)
    } else {
        format!("R$ {}", body)
    }
}

/// Formats a date as `dd/mm/aaaa`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Formats a ratio as a percentage, e.g. `0.1234` -> `12,34%`.
pub fn format_percentage(ratio: Decimal) -> String {
    let percent = ratio * Decimal::ONE_HUNDRED;
    let body = format_decimal_ptbr(percent.abs(), 2);
    if percent.is_sign_negative() && !round_money(percent, 2).is_zero() {
        format!("-{}%", body)
    } else {
        format!("{}%", body)
    }
}

/// Short month label used as a grid column header, e.g. `mar/2023`.
pub fn month_label(key: MonthKey) -> String {
    let idx = (key.month.clamp(1, 12) - 1) as usize;
    format!("{}/{}", MONTH_ABBREVIATIONS[idx], key.year)
}

/// Formats a non-negative decimal with pt-BR separators.
fn format_decimal_ptbr(value: Decimal, decimal_places: u32) -> String {
    let rounded = round_money(value, decimal_places);
    let text = format!("{:.*}", decimal_places as usize, rounded);
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text.clone(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(*c);
    }

    match frac_part {
        Some(frac) => format!("{},{}", grouped, frac),
        None => grouped,
    }
}
