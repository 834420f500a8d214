use chrono::NaiveDate;

use crate::dates::{parse_date_str, parse_three_part};
use crate::types::DamageRecord;

/// What the operator narrowed the dashboard down to. Blank strings count as
/// "not set".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub id_substring: Option<String>,
    pub vehicle_substring: Option<String>,
    pub exact_type: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FilterCriteria {
    /// Same criteria minus the driver search box.
    pub fn without_search(&self) -> Self {
        Self { id_substring: None, ..self.clone() }
    }
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Date used by the range filter, re-read from the displayed text.
fn displayed_date(record: &DamageRecord) -> Option<NaiveDate> {
    parse_three_part(&record.raw_date_text, &['-', '/']).or_else(|| parse_date_str(&record.raw_date_text))
}

pub fn matches(record: &DamageRecord, criteria: &FilterCriteria) -> bool {
    if let Some(q) = set(&criteria.id_substring) {
        if !contains_ci(&record.personnel_id, q) {
            return false;
        }
    }
    if let Some(q) = set(&criteria.vehicle_substring) {
        if !contains_ci(&record.vehicle_mode, q) {
            return false;
        }
    }
    if let Some(t) = set(&criteria.exact_type) {
        if record.vehicle_category != t {
            return false;
        }
    }
    if criteria.start_date.is_some() || criteria.end_date.is_some() {
        // Records whose date cannot be read are never excluded by a range.
        if let Some(date) = displayed_date(record) {
            if criteria.start_date.is_some_and(|start| date < start) {
                return false;
            }
            if criteria.end_date.is_some_and(|end| date > end) {
                return false;
            }
        }
    }
    true
}

/// Order-preserving selection of the records passing `criteria`.
pub fn filter_records(records: &[DamageRecord], criteria: &FilterCriteria) -> Vec<DamageRecord> {
    records.iter().filter(|r| matches(r, criteria)).cloned().collect()
}
