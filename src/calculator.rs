//! Line totals, subtotal, tax and grand total.
//!
//! Everything here is infallible: input that does not parse as a number
//! counts as zero.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{LineItem, NumericInput, Totals};

/// Fixed GST rate applied to the subtotal.
pub const TAX_RATE: f64 = 0.18;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)")
        .expect("leading number pattern is valid")
});

/// Parse the longest numeric prefix of `raw`, ignoring leading whitespace.
///
/// `"12.5kg"` is 12.5, `"  3"` is 3, `"abc"` and `""` are `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let m = LEADING_NUMBER.find(raw.trim_start())?;
    let text = m.as_str();
    match text.trim_start_matches(['+', '-']) {
        "Infinity" if text.starts_with('-') => Some(f64::NEG_INFINITY),
        "Infinity" => Some(f64::INFINITY),
        _ => text.parse::<f64>().ok(),
    }
}

pub fn to_number(input: &NumericInput) -> f64 {
    parse_number(input.as_str()).unwrap_or(0.0)
}

pub fn line_total(item: &LineItem) -> f64 {
    to_number(&item.quantity) * to_number(&item.rate)
}

/// Sums line totals in slice order so repeated calls round identically.
pub fn compute_totals(items: &[LineItem]) -> Totals {
    let subtotal: f64 = items.iter().map(line_total).sum();
    let tax = subtotal * TAX_RATE;
    Totals {
        subtotal,
        tax,
        total: subtotal + tax,
    }
}
