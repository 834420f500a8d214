use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

use crate::error::ReportError;
use crate::headers::passthrough;
use crate::types::{DamageRecord, FileState, FileStatus, MonthlyMatrix, Row};
use crate::xref::PersonnelEntry;

fn io_error(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::Io { file: path.display().to_string(), source }
}

fn csv_error(path: &Path, source: csv::Error) -> ReportError {
    ReportError::Csv { file: path.display().to_string(), source }
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for r in rows {
        wtr.serialize(r).map_err(|e| csv_error(path, e))?;
    }
    wtr.flush().map_err(|e| io_error(path, e))?;
    info!(file = %path.display(), rows = rows.len(), "report written");
    Ok(())
}

/// Monthly matrix as CSV: a `Maand` column followed by one column per year.
pub fn write_monthly_csv(path: &Path, matrix: &MonthlyMatrix) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    for record in monthly_records(matrix) {
        wtr.write_record(&record).map_err(|e| csv_error(path, e))?;
    }
    wtr.flush().map_err(|e| io_error(path, e))?;
    info!(file = %path.display(), "report written");
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ReportError> {
    let s = serde_json::to_string_pretty(value)
        .map_err(|source| ReportError::Json { file: path.display().to_string(), source })?;
    fs::write(path, s).map_err(|e| io_error(path, e))?;
    info!(file = %path.display(), "summary written");
    Ok(())
}

fn markdown(records: Vec<Vec<String>>) -> String {
    let mut builder = Builder::default();
    for record in records {
        builder.push_record(record);
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(geen rijen)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

fn monthly_records(matrix: &MonthlyMatrix) -> Vec<Vec<String>> {
    let mut header = vec!["Maand".to_string()];
    header.extend(matrix.years.iter().map(|y| y.to_string()));

    let mut records = vec![header];
    for row in &matrix.rows {
        let mut record = vec![row.month.clone()];
        record.extend(row.counts.iter().map(|(_, n)| n.to_string()));
        records.push(record);
    }
    records
}

pub fn monthly_table(matrix: &MonthlyMatrix) -> String {
    markdown(monthly_records(matrix))
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Incidents with their dedicated fields followed by the passthrough columns.
pub fn incident_table(records: &[DamageRecord], extra_headers: &[String]) -> String {
    let mut header: Vec<String> = ["Datum", "Naam", "Locatie", "Type", "Voertuig", "Schade", "Link"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(extra_headers.iter().cloned());

    let mut rows = vec![header];
    for r in records {
        let mut row = vec![
            r.raw_date_text.clone(),
            r.full_name.clone(),
            or_dash(&r.location),
            r.vehicle_category.clone(),
            r.vehicle_mode.clone(),
            r.damage_kind.clone(),
            or_dash(&r.link),
        ];
        row.extend(passthrough(&r.source_row, extra_headers));
        rows.push(row);
    }
    markdown(rows)
}

pub fn status_table(statuses: &[FileStatus]) -> String {
    let mut rows = vec![vec!["Bestand".to_string(), "Status".to_string(), "Melding".to_string()]];
    for s in statuses {
        let state = match s.status {
            FileState::Success => "ok",
            FileState::Error => "fout",
            FileState::NotFound => "niet gevonden",
        };
        rows.push(vec![s.file.clone(), state.to_string(), s.message.clone().unwrap_or_default()]);
    }
    markdown(rows)
}

/// Two-column field/value card for a personnel directory entry.
pub fn personnel_card(entry: &PersonnelEntry) -> String {
    let mut rows = vec![vec!["Veld".to_string(), "Waarde".to_string()]];
    if let Some(key) = &entry.key {
        rows.push(vec!["Sleutel".to_string(), key.clone()]);
    }
    for (column, cell) in entry.fields.iter() {
        rows.push(vec![column.to_string(), cell.as_text()]);
    }
    markdown(rows)
}

/// Loose rows (coaching, conversations) with the union of their columns,
/// in first-seen order.
pub fn rows_table(rows: &[&Row]) -> String {
    let mut seen = HashSet::new();
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if seen.insert(column.clone()) {
                columns.push(column);
            }
        }
    }

    let mut records = vec![columns.clone()];
    for row in rows {
        records.push(
            columns
                .iter()
                .map(|c| row.get(c).map(|cell| cell.as_text()).unwrap_or_default())
                .collect(),
        );
    }
    markdown(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MonthlyRow;

    #[test]
    fn monthly_records_have_a_column_per_year() {
        let matrix = MonthlyMatrix {
            years: vec![2023, 2024],
            rows: vec![MonthlyRow { month: "januari".into(), counts: vec![(2023, 1), (2024, 4)] }],
        };
        let records = monthly_records(&matrix);
        assert_eq!(records[0], vec!["Maand", "2023", "2024"]);
        assert_eq!(records[1], vec!["januari", "1", "4"]);
        assert!(monthly_table(&matrix).contains("januari"));
    }

    #[test]
    fn incident_table_shows_link_and_passthrough_columns() {
        use crate::loader::{map_row, MapperPolicy};

        let linked = Row::new()
            .with("Personeelsnr", "12")
            .with("Datum", "01-01-2024")
            .with("Link", "https://example.org/12")
            .with("Opmerking", "spiegel");
        let unlinked = Row::new().with("Personeelsnr", "13").with("Datum", "02-01-2024");
        let records: Vec<DamageRecord> = [linked, unlinked]
            .iter()
            .filter_map(|r| map_row(r, MapperPolicy::Lenient))
            .collect();

        let table = incident_table(&records, &["Opmerking".to_string()]);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].contains("Link") && lines[0].contains("Opmerking"));
        assert!(lines[2].contains("https://example.org/12") && lines[2].contains("spiegel"));
        let last: Vec<&str> = lines[3].split('|').map(str::trim).filter(|c| !c.is_empty()).collect();
        assert_eq!(last[last.len() - 2..], ["-", "-"]);
    }

    #[test]
    fn rows_table_unions_columns() {
        let a = Row::new().with("P-nr", "1").with("Datum", "01-01-2024");
        let b = Row::new().with("P-nr", "2").with("Opmerking", "gepland");
        let table = rows_table(&[&a, &b]);
        let header = table.lines().next().unwrap_or_default();
        assert!(header.contains("P-nr") && header.contains("Datum") && header.contains("Opmerking"));
    }

    #[test]
    fn status_table_translates_states() {
        let table = status_table(&[
            FileStatus::success("schade met macro"),
            FileStatus::not_found("Coachingslijst", "bestand niet gevonden"),
        ]);
        assert!(table.contains("niet gevonden"));
        assert!(table.contains("schade met macro"));
    }

    #[test]
    fn csv_and_json_land_on_disk() {
        let dir = std::env::temp_dir().join(format!("schade_report_output_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let matrix = MonthlyMatrix {
            years: vec![2024],
            rows: vec![MonthlyRow { month: "mei".into(), counts: vec![(2024, 2)] }],
        };
        let csv_path = dir.join("maanden.csv");
        write_monthly_csv(&csv_path, &matrix).unwrap();
        assert_eq!(fs::read_to_string(&csv_path).unwrap(), "Maand,2024\nmei,2\n");

        let json_path = dir.join("summary.json");
        write_json(&json_path, &serde_json::json!({"total_incidents": 3})).unwrap();
        assert!(fs::read_to_string(&json_path).unwrap().contains("\"total_incidents\": 3"));
        fs::remove_dir_all(&dir).ok();
    }
}
