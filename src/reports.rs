use std::collections::{BTreeSet, HashMap};

use chrono::Datelike;

use crate::types::{
    CountRow, DamageRecord, DashboardStats, DriverTally, EligibleDriver, MonthlyMatrix, MonthlyRow,
    SeniorityBin, SenioritySample, SummaryStats, UNKNOWN,
};
use crate::util::{average, canonical_id, round2};
use crate::xref::CoachingLists;

const TOP_N: usize = 10;

/// More incidents than this (within the current filter) makes a driver a
/// coaching candidate.
pub const COACHING_THRESHOLD: usize = 2;

const MONTHS: [&str; 12] = [
    "januari",
    "februari",
    "maart",
    "april",
    "mei",
    "juni",
    "juli",
    "augustus",
    "september",
    "oktober",
    "november",
    "december",
];

/// Group-count in first-appearance order, then sort by count descending.
/// The sort is stable, so ties keep the order in which they were first seen.
fn count_by<'a, F>(records: &'a [DamageRecord], key: F) -> Vec<CountRow>
where
    F: Fn(&'a DamageRecord) -> &'a str,
{
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<CountRow> = Vec::new();
    for r in records {
        let k = key(r);
        let k = if k.is_empty() { UNKNOWN } else { k };
        match index.get(k) {
            Some(&i) => rows[i].value += 1,
            None => {
                index.insert(k, rows.len());
                rows.push(CountRow { name: k.to_string(), value: 1 });
            }
        }
    }
    rows.sort_by(|a, b| b.value.cmp(&a.value));
    rows
}

pub fn dashboard_stats(filtered: &[DamageRecord]) -> DashboardStats {
    let mut by_type = count_by(filtered, |r| r.damage_kind.as_str());
    by_type.truncate(TOP_N);
    let by_vehicle = count_by(filtered, |r| r.vehicle_category.as_str());
    let mut by_location = location_overview(filtered);
    by_location.truncate(TOP_N);

    DashboardStats {
        total_incidents: filtered.len(),
        by_type,
        by_vehicle,
        by_location,
    }
}

/// Every location with its incident count, untruncated.
pub fn location_overview(filtered: &[DamageRecord]) -> Vec<CountRow> {
    count_by(filtered, |r| r.location.as_str())
}

/// Incident count per bus/tram identifier.
pub fn vehicle_overview(filtered: &[DamageRecord]) -> Vec<CountRow> {
    count_by(filtered, |r| r.vehicle_mode.as_str())
}

/// Incidents per calendar month, one column per year present. Records
/// without a readable date are left out.
pub fn monthly_matrix(filtered: &[DamageRecord]) -> MonthlyMatrix {
    let mut counts: HashMap<(u32, i32), usize> = HashMap::new();
    let mut years = BTreeSet::new();
    for date in filtered.iter().filter_map(|r| r.parsed_date) {
        *counts.entry((date.month0(), date.year())).or_default() += 1;
        years.insert(date.year());
    }
    let years: Vec<i32> = years.into_iter().collect();

    let rows = MONTHS
        .iter()
        .enumerate()
        .map(|(m, name)| MonthlyRow {
            month: name.to_string(),
            counts: years
                .iter()
                .map(|y| (*y, counts.get(&(m as u32, *y)).copied().unwrap_or(0)))
                .collect(),
        })
        .collect();

    MonthlyMatrix { years, rows }
}

/// Label and sort key of the 5-year bucket holding `years`.
pub fn seniority_bin(years: i64) -> (String, i64) {
    if years <= 5 {
        return ("0 tot 5".to_string(), 0);
    }
    let index = (years - 5 + 4) / 5;
    let start = 5 + (index - 1) * 5 + 1;
    let end = 5 + index * 5;
    (format!("{} tot {}", start, end), start)
}

pub fn seniority_bins(samples: &[SenioritySample]) -> Vec<SeniorityBin> {
    let mut bins: HashMap<String, (i64, Vec<f64>)> = HashMap::new();
    for s in samples {
        let (label, sort_key) = seniority_bin(s.years_of_service);
        bins.entry(label).or_insert_with(|| (sort_key, Vec::new())).1.push(s.damage_count);
    }

    let mut rows: Vec<SeniorityBin> = bins
        .into_iter()
        .map(|(label, (sort_key, damages))| SeniorityBin {
            label,
            average_damages: round2(average(&damages)),
            person_count: damages.len(),
            sort_key,
        })
        .collect();
    rows.sort_by_key(|b| b.sort_key);
    rows
}

/// Drivers with more than `COACHING_THRESHOLD` incidents in `filtered` and
/// no finished coaching, most incidents first. `is_planned` marks drivers
/// already on the requested list.
pub fn coaching_eligibility(filtered: &[DamageRecord], coaching: &CoachingLists) -> Vec<EligibleDriver> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut tallies: Vec<(&str, &str, usize)> = Vec::new();
    for r in filtered.iter().filter(|r| !r.personnel_id.is_empty()) {
        match index.get(r.personnel_id.as_str()) {
            Some(&i) => {
                tallies[i].1 = r.full_name.as_str();
                tallies[i].2 += 1;
            }
            None => {
                index.insert(r.personnel_id.as_str(), tallies.len());
                tallies.push((r.personnel_id.as_str(), r.full_name.as_str(), 1));
            }
        }
    }

    let completed = coaching.completed_ids();
    let requested = coaching.requested_ids();

    let mut eligible: Vec<EligibleDriver> = tallies
        .into_iter()
        .filter(|(id, _, count)| *count > COACHING_THRESHOLD && !completed.contains(&canonical_id(id)))
        .map(|(id, name, count)| EligibleDriver {
            personnel_id: id.to_string(),
            full_name: name.to_string(),
            count,
            is_planned: requested.contains(&canonical_id(id)),
        })
        .collect();
    eligible.sort_by(|a, b| b.count.cmp(&a.count));
    eligible
}

/// Incident count per driver with the first name seen for them.
pub fn top_drivers(filtered: &[DamageRecord]) -> Vec<DriverTally> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<DriverTally> = Vec::new();
    for r in filtered {
        match index.get(r.personnel_id.as_str()) {
            Some(&i) => rows[i].count += 1,
            None => {
                index.insert(r.personnel_id.as_str(), rows.len());
                rows.push(DriverTally {
                    personnel_id: r.personnel_id.clone(),
                    full_name: r.full_name.clone(),
                    count: 1,
                });
            }
        }
    }
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Distinct vehicle categories across the whole dataset, for the type
/// filter choices.
pub fn unique_types(records: &[DamageRecord]) -> Vec<String> {
    records
        .iter()
        .filter(|r| !r.vehicle_category.is_empty())
        .map(|r| r.vehicle_category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn unique_driver_count(filtered: &[DamageRecord]) -> usize {
    filtered.iter().map(|r| r.personnel_id.as_str()).collect::<BTreeSet<_>>().len()
}

pub fn generate_summary(filtered: &[DamageRecord], eligible: &[EligibleDriver]) -> SummaryStats {
    SummaryStats {
        total_incidents: filtered.len(),
        unique_drivers: unique_driver_count(filtered),
        eligible_for_coaching: eligible.len(),
        planned_coachings: eligible.iter().filter(|e| e.is_planned).count(),
        dated_incidents: filtered.iter().filter(|r| r.parsed_date.is_some()).count(),
    }
}
