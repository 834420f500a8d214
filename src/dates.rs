// Date normalization for the incident log.
//
// Spreadsheet exports mix real date cells, day-count serials and a handful
// of text layouts (`15-03-2024`, `2024/03/15`, `20240315`, ...). Everything
// funnels through `parse_date`, which never fails loudly: an unreadable value
// is simply `None`.
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

use crate::types::Cell;

/// Serial day numbers beyond this are not spreadsheet dates.
const MAX_SERIAL_DAYS: f64 = 3_000_000.0;

/// Layouts tried, in order, once the structured rules have failed.
const FALLBACK_DATE_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];
const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

fn spreadsheet_epoch() -> NaiveDate {
    // 1899-12-30 is always representable.
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default()
}

/// Parse any cell into a calendar date.
pub fn parse_date(value: &Cell) -> Option<NaiveDate> {
    match value {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => from_serial(*n),
        Cell::Text(s) => parse_date_str(s),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

/// Convert a spreadsheet day-count serial, rounding to the nearest day.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial.abs() > MAX_SERIAL_DAYS {
        return None;
    }
    spreadsheet_epoch().checked_add_signed(Duration::days(serial.round() as i64))
}

pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(d) = parse_three_part(s, &['/', '-', '.']) {
        return Some(d);
    }
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        if let Some(d) = parse_compact(s) {
            return Some(d);
        }
    }
    parse_generic(s)
}

/// Split on any of `separators` into exactly three numeric parts. A leading
/// part above 1000 means year-month-day, otherwise day-month-year. Two-digit
/// years land in the 2000s.
pub fn parse_three_part(s: &str, separators: &[char]) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split(|c| separators.contains(&c)).collect();
    if parts.len() != 3 {
        return None;
    }
    let mut nums = [0i32; 3];
    for (slot, part) in nums.iter_mut().zip(&parts) {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse().ok()?;
    }
    let (mut year, month, day) = if nums[0] > 1000 {
        (nums[0], nums[1], nums[2])
    } else {
        (nums[2], nums[1], nums[0])
    };
    if year < 100 {
        year += 2000;
    }
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}

fn parse_compact(s: &str) -> Option<NaiveDate> {
    let year = s[0..4].parse().ok()?;
    let month = s[4..6].parse().ok()?;
    let day = s[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_generic(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }
    FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok().map(|dt| dt.date()))
        .or_else(|| FALLBACK_DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(s, f).ok()))
}

/// Display form of a date cell: `DD-MM-YYYY` when it parses, otherwise the
/// original value, or `-` when there is nothing to show.
pub fn format_date(value: &Cell) -> String {
    match parse_date(value) {
        Some(d) => d.format("%d-%m-%Y").to_string(),
        None if value.is_blank() => "-".to_string(),
        None => value.as_text(),
    }
}
