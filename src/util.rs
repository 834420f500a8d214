// Forgiving number parsing, personnel-number comparison and small
// statistics helpers shared by the loader and the reports.
use num_format::{Locale, ToFormattedString};

use crate::types::Cell;

/// Parse a string-like value into `f64` while being forgiving about
/// formatting issues that are common in spreadsheet exports.
///
/// - Trims whitespace.
/// - Rejects values that contain alphabetic characters.
/// - Treats a lone comma as a decimal comma (`2,5`), otherwise strips commas
///   as thousands separators.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s = if s.contains(',') && !s.contains('.') && s.matches(',').count() == 1 {
        s.replace(',', ".")
    } else {
        s.replace(',', "")
    };
    s.parse::<f64>().ok()
}

/// Leading integer of a string, ignoring whatever follows (`"12.7"` -> 12,
/// `"8 jaar"` -> 8).
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<i64>().ok().map(|n| sign * n)
}

pub fn cell_f64(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(s) => parse_f64_safe(Some(s)),
        _ => None,
    }
}

pub fn cell_int(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(n.trunc() as i64),
        Cell::Text(s) => parse_int_prefix(s),
        _ => None,
    }
}

/// Identifier normal form: lower-cased and trimmed.
pub fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

pub fn strip_leading_zeros(id: &str) -> &str {
    id.trim_start_matches('0')
}

/// Leading-zero-insensitive identifier equality (`"007"` matches `"7"`).
///
/// An empty candidate never matches through the zero-stripped form, so a
/// blank cell does not line up with a query of `"0"`.
pub fn ids_match(candidate: &str, query: &str) -> bool {
    let a = normalize_id(candidate);
    let b = normalize_id(query);
    a == b || (!a.is_empty() && strip_leading_zeros(&a) == strip_leading_zeros(&b))
}

/// Key used when identifiers are collected into sets, consistent with
/// `ids_match`.
pub fn canonical_id(id: &str) -> String {
    strip_leading_zeros(&normalize_id(id)).to_string()
}

/// Arithmetic mean, 0 for an empty slice.
pub fn average(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

pub fn round2(n: f64) -> f64 {
    (n * 100.0).round() / 100.0
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Dutch grouping: 12.345 records.
    n.to_formatted_string(&Locale::nl)
}
