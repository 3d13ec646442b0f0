//! Presentation formatting for amounts and dates (en-IN, INR).

use chrono::NaiveDate;

pub const CURRENCY_SYMBOL: &str = "₹";

/// `1234567.891` → `₹12,34,567.89`.
///
/// Indian grouping: the last three integer digits form one group, the rest
/// are grouped in pairs.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        let sign = if amount.is_sign_negative() { "-" } else { "" };
        return format!("{sign}{CURRENCY_SYMBOL}∞");
    }

    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    // -0.001 rounds to 0.00 and must not print as negative.
    let negative = amount < 0.0 && fixed.bytes().any(|b| b.is_ascii_digit() && b != b'0');
    let sign = if negative { "-" } else { "" };

    format!("{sign}{CURRENCY_SYMBOL}{}.{frac_part}", group_indian(int_part))
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{tail}", groups.join(","))
}

/// Plain number display: `1500.5`, `1e+21`, `Infinity`.
///
/// Decimal notation between `1e-6` and `1e21`, exponent notation outside it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-Infinity" } else { "Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return value.to_string();
    }
    let exponent = format!("{value:e}");
    match exponent.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => exponent,
    }
}

/// `2026-10-19` → `19 October 2026`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %B %Y").to_string()
}
