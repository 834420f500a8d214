use serde::Deserialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::dates::{format_date, parse_date};
use crate::error::ReportError;
use crate::headers::{
    find_text, find_value, find_value_except, first_present, first_present_text, passthrough_headers,
};
use crate::source::DataSource;
use crate::types::{
    Cell, DamageRecord, FileStatus, Row, SenioritySample, Workbook, OTHER_CATEGORY, UNKNOWN,
};
use crate::util::{cell_f64, cell_int};
use crate::xref::{AuthorizedUser, CoachingLists, CrossReferenceIndex, PersonnelDirectory};

/// How raw rows are turned into damage records.
///
/// `Lenient` resolves drifting headers and keeps any row with identifiable
/// content. `Strict` is the older behaviour: fixed header spellings and rows
/// without a personnel number are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapperPolicy {
    #[default]
    Lenient,
    Strict,
}

const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("standaard", "Standaard"),
    ("gelede", "Gelede"),
    ("flexity", "Flexity"),
    ("hermelijn", "Hermelijn"),
];

const TYPE_KEYS: &[&str] = &["Type", "Voertuigtype", "Categorie"];
const MODE_KEYS: &[&str] = &["bus/tram", "Voertuig", "Bus tram"];
const DAMAGE_KEYS: &[&str] = &["Schade", "Soort", "Type Schade", "Schade Type", "Omschrijving", "Aard schade"];
const LOCATION_KEYS: &[&str] = &["Locatie", "Plaats", "Lokatie"];
const ID_KEYS: &[&str] = &["Personeelsnr", "Personeels nr", "ID", "Stamnr", "Stamnummer", "P-nr"];
const NAME_KEYS: &[&str] = &["Volledige Naam", "Naam", "Chauffeur", "Bestuurder"];
// Only used when no driver name column resolves.
const COACH_KEYS: &[&str] = &["Teamcoach"];
const LINK_KEYS: &[&str] = &["Link", "URL", "Hyperlink"];
const DATE_KEYS: &[&str] = &["Datum", "Schadedatum", "Datum schade", "Datum ongeval"];

/// Spellings of every other field; the damage kind never borrows these
/// columns through a substring match.
const NON_DAMAGE_KEYS: &[&[&str]] =
    &[TYPE_KEYS, MODE_KEYS, LOCATION_KEYS, ID_KEYS, NAME_KEYS, COACH_KEYS, LINK_KEYS, DATE_KEYS];

// Exact spellings used by the older mapper, in lookup order.
const STRICT_TYPE_KEYS: &[&str] = &["Type", "type"];
const STRICT_MODE_KEYS: &[&str] = &["bus/tram", "Bus/Tram", "Voertuig", "voertuig"];
const STRICT_DAMAGE_KEYS: &[&str] =
    &["Schade", "schade", "Soort", "soort", "Type Schade", "Schade Type", "Omschrijving"];
const STRICT_ID_KEYS: &[&str] = &["personeelsnr", "Personeelsnr", "ID", "stamnr"];
const STRICT_NAME_KEYS: &[&str] = &[
    "Volledige Naam",
    "volledige naam",
    "Volledige naam",
    "VOLLEDIGE NAAM",
    "Naam",
    "naam",
    "Chauffeur",
    "Bestuurder",
    "bestuurder",
    "TEAMCOACH",
    "Teamcoach",
];
const STRICT_LOCATION_KEYS: &[&str] = &["locatie", "Locatie", "Plaats"];
const STRICT_DATE_KEYS: &[&str] = &["Datum", "datum"];
const STRICT_LINK_KEYS: &[&str] = &["link", "Link"];

/// Coarse vehicle category from the free-text type column.
pub fn classify_vehicle(raw: &str) -> String {
    let raw = raw.trim();
    let lower = raw.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, category)| category.to_string())
        .unwrap_or_else(|| if raw.is_empty() { OTHER_CATEGORY.to_string() } else { raw.to_string() })
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

/// Map one raw row; `None` means the row is dropped.
pub fn map_row(row: &Row, policy: MapperPolicy) -> Option<DamageRecord> {
    match policy {
        MapperPolicy::Lenient => map_row_lenient(row),
        MapperPolicy::Strict => map_row_strict(row),
    }
}

fn map_row_lenient(row: &Row) -> Option<DamageRecord> {
    let date_cell = find_value(row, DATE_KEYS, true).cloned().unwrap_or(Cell::Empty);
    let parsed_date = parse_date(&date_cell);

    let mut full_name = find_text(row, NAME_KEYS, true);
    if full_name.is_empty() {
        full_name = find_text(row, COACH_KEYS, true);
    }
    let damage_kind = find_value_except(row, DAMAGE_KEYS, NON_DAMAGE_KEYS)
        .map(|c| c.as_text().trim().to_string())
        .unwrap_or_default();

    let record = DamageRecord {
        personnel_id: find_text(row, ID_KEYS, true),
        full_name: or_unknown(full_name),
        location: find_text(row, LOCATION_KEYS, true),
        raw_date_text: format_date(&date_cell),
        parsed_date,
        link: find_text(row, LINK_KEYS, true),
        vehicle_category: classify_vehicle(&find_text(row, TYPE_KEYS, true)),
        damage_kind: or_unknown(damage_kind),
        vehicle_mode: or_unknown(find_text(row, MODE_KEYS, true)),
        source_row: row.clone(),
    };

    let has_content = record.parsed_date.is_some()
        || !record.personnel_id.is_empty()
        || record.full_name != UNKNOWN
        || !record.location.is_empty()
        || record.damage_kind != UNKNOWN;
    has_content.then_some(record)
}

fn map_row_strict(row: &Row) -> Option<DamageRecord> {
    let personnel_id = first_present_text(row, STRICT_ID_KEYS);
    if personnel_id.is_empty() {
        return None;
    }
    let date_cell = first_present(row, STRICT_DATE_KEYS).cloned().unwrap_or(Cell::Empty);
    let raw_date_text = match &date_cell {
        Cell::Date(d) => d.format("%d-%m-%Y").to_string(),
        other => other.as_text(),
    };

    Some(DamageRecord {
        personnel_id,
        full_name: or_unknown(first_present_text(row, STRICT_NAME_KEYS)),
        location: first_present_text(row, STRICT_LOCATION_KEYS),
        parsed_date: parse_date(&date_cell),
        raw_date_text,
        link: first_present_text(row, STRICT_LINK_KEYS),
        vehicle_category: classify_vehicle(&first_present_text(row, STRICT_TYPE_KEYS)),
        damage_kind: or_unknown(first_present_text(row, STRICT_DAMAGE_KEYS)),
        vehicle_mode: or_unknown(first_present_text(row, STRICT_MODE_KEYS)),
        source_row: row.clone(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MappedBatch {
    pub records: Vec<DamageRecord>,
    /// Column names of the first row, in sheet order.
    pub headers: Vec<String>,
    pub report: LoadReport,
}

pub fn map_rows(rows: &[Row], policy: MapperPolicy) -> MappedBatch {
    let headers = rows.first().map(Row::columns).unwrap_or_default();
    let records: Vec<DamageRecord> = rows.iter().filter_map(|r| map_row(r, policy)).collect();
    let report = LoadReport {
        total_rows: rows.len(),
        kept_rows: records.len(),
        dropped_rows: rows.len() - records.len(),
    };
    MappedBatch { records, headers, report }
}

pub fn is_seniority_sheet(name: &str) -> bool {
    let compact: String = name.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
    compact == "schades-dienstjaar" || compact == "schadesdienstjaar"
}

/// One sample per employee row; rows without a numeric years-of-service or
/// damage count are discarded.
pub fn seniority_samples(rows: &[Row]) -> Vec<SenioritySample> {
    rows.iter()
        .filter_map(|row| {
            let mut years = None;
            let mut damages = None;
            for (column, cell) in row.iter() {
                match column.trim().to_lowercase().as_str() {
                    "dienstjaren" | "dienstjaar" => years = Some(cell),
                    "schades" | "schade" | "aantal" => damages = Some(cell),
                    _ => {}
                }
            }
            Some(SenioritySample {
                years_of_service: cell_int(years?)?,
                damage_count: cell_f64(damages?)?,
            })
        })
        .collect()
}

/// Everything derived from one fetch of the share.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub records: Vec<DamageRecord>,
    /// Passthrough columns (first-row headers minus the dedicated fields).
    pub extra_headers: Vec<String>,
    pub seniority: Vec<SenioritySample>,
    pub index: CrossReferenceIndex,
    pub statuses: Vec<FileStatus>,
    pub report: LoadReport,
}

/// Fetch and normalize every file. Only the primary workbook is required.
pub fn refresh(source: &dyn DataSource, settings: &Settings) -> Result<Snapshot, ReportError> {
    let data = &settings.data;
    let mut statuses = Vec::new();

    let primary = source
        .workbook(&data.primary_workbook)?
        .ok_or_else(|| ReportError::MissingFile { file: data.primary_workbook.clone() })?;
    let sheet = primary.sheet(&data.primary_sheet).ok_or_else(|| ReportError::MissingSheet {
        workbook: data.primary_workbook.clone(),
        sheet: data.primary_sheet.clone(),
    })?;
    info!(workbook = %primary.name, sheets = primary.sheets.len(), "primary workbook fetched");
    let batch = map_rows(&sheet.rows, settings.mapper.policy);
    statuses.push(FileStatus::success(&data.primary_workbook));
    info!(
        total = batch.report.total_rows,
        kept = batch.report.kept_rows,
        dropped = batch.report.dropped_rows,
        policy = ?settings.mapper.policy,
        "incident sheet mapped"
    );

    let seniority = match primary.find_sheet(is_seniority_sheet) {
        Some(sheet) => seniority_samples(&sheet.rows),
        None => {
            warn!(workbook = %data.primary_workbook, "no seniority sheet");
            statuses.push(FileStatus::not_found("schades-dienstjaar", "tabblad niet gevonden"));
            Vec::new()
        }
    };

    let personnel = match source.json(&data.personnel_file) {
        Ok(Some(value)) => {
            statuses.push(FileStatus::success(&data.personnel_file));
            PersonnelDirectory::from_json(&value)
        }
        Ok(None) => {
            statuses.push(FileStatus::not_found(&data.personnel_file, "bestand niet gevonden"));
            PersonnelDirectory::default()
        }
        Err(e) => {
            warn!(file = %data.personnel_file, error = %e, "personnel directory unreadable");
            statuses.push(FileStatus::error(&data.personnel_file, e.to_string()));
            PersonnelDirectory::default()
        }
    };

    let coaching = auxiliary_workbook(source, &data.coaching_workbook, &mut statuses)
        .map(|wb| CoachingLists {
            requested: sheet_rows(&wb, &data.coaching_requested_sheet),
            completed: sheet_rows(&wb, &data.coaching_completed_sheet),
        })
        .unwrap_or_default();

    let users: Vec<AuthorizedUser> = auxiliary_workbook(source, &data.users_workbook, &mut statuses)
        .and_then(|wb| wb.first_sheet().map(|s| s.rows.iter().map(AuthorizedUser::from_row).collect()))
        .unwrap_or_default();

    let conversations: Vec<Row> = auxiliary_workbook(source, &data.conversations_workbook, &mut statuses)
        .and_then(|wb| wb.first_sheet().map(|s| s.rows.clone()))
        .unwrap_or_default();

    Ok(Snapshot {
        records: batch.records,
        extra_headers: passthrough_headers(&batch.headers),
        seniority,
        index: CrossReferenceIndex { personnel, coaching, conversations, users },
        statuses,
        report: batch.report,
    })
}

fn sheet_rows(workbook: &Workbook, sheet: &str) -> Vec<Row> {
    workbook.sheet(sheet).map(|s| s.rows.clone()).unwrap_or_default()
}

/// Fetch a non-essential workbook, recording its status. Never fails.
fn auxiliary_workbook(source: &dyn DataSource, name: &str, statuses: &mut Vec<FileStatus>) -> Option<Workbook> {
    match source.workbook(name) {
        Ok(Some(wb)) => {
            statuses.push(FileStatus::success(name));
            Some(wb)
        }
        Ok(None) => {
            warn!(workbook = name, "auxiliary workbook not found");
            statuses.push(FileStatus::not_found(name, "bestand niet gevonden"));
            None
        }
        Err(e) => {
            warn!(workbook = name, error = %e, "auxiliary workbook unreadable");
            statuses.push(FileStatus::error(name, e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileState, Sheet};
    use chrono::NaiveDate;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemorySource {
        workbooks: HashMap<String, Workbook>,
        json: HashMap<String, Value>,
    }

    impl MemorySource {
        fn with_sheet(mut self, workbook: &str, sheet: &str, rows: Vec<Row>) -> Self {
            let wb = self.workbooks.entry(workbook.to_string()).or_insert_with(|| Workbook {
                name: workbook.to_string(),
                sheets: Vec::new(),
            });
            wb.sheets.push(Sheet { name: sheet.to_string(), rows });
            self
        }
    }

    impl DataSource for MemorySource {
        fn workbook(&self, name: &str) -> Result<Option<Workbook>, ReportError> {
            Ok(self.workbooks.get(name).cloned())
        }

        fn json(&self, name: &str) -> Result<Option<Value>, ReportError> {
            Ok(self.json.get(name).cloned())
        }
    }

    fn incident(id: &str, name: &str, date: &str, kind: &str) -> Row {
        Row::new().with("ID", id).with("Naam", name).with("Datum", date).with("Type", kind)
    }

    #[test]
    fn vehicle_classification_by_keyword() {
        assert_eq!(classify_vehicle("Standaard bus"), "Standaard");
        assert_eq!(classify_vehicle("GELEDE BUS"), "Gelede");
        assert_eq!(classify_vehicle("tram flexity 2"), "Flexity");
        assert_eq!(classify_vehicle("Hermelijn"), "Hermelijn");
        assert_eq!(classify_vehicle(" minibus "), "minibus");
        assert_eq!(classify_vehicle(""), "Overig");
    }

    #[test]
    fn lenient_mapping_resolves_drifting_headers() {
        let row = Row::new()
            .with("Personeels-nr", " 0042 ")
            .with("BestuurderNaam", "Jan Peeters")
            .with("Schadedatum", "2024/03/15")
            .with("Plaats", "Korenmarkt")
            .with("Link", "https://example.org/42");
        let rec = map_row(&row, MapperPolicy::Lenient).unwrap();
        assert_eq!(rec.personnel_id, "0042");
        assert_eq!(rec.full_name, "Jan Peeters");
        assert_eq!(rec.location, "Korenmarkt");
        assert_eq!(rec.raw_date_text, "15-03-2024");
        assert_eq!(rec.parsed_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(rec.link, "https://example.org/42");
        assert_eq!(rec.vehicle_category, "Overig");
        assert_eq!(rec.vehicle_mode, "Onbekend");
    }

    #[test]
    fn lenient_retention_drops_only_noise() {
        let noise = Row::new().with("Opmerking", "").with("Extra", "  ");
        assert!(map_row(&noise, MapperPolicy::Lenient).is_none());

        let location_only = Row::new().with("locatie", "Gent Sint-Pieters");
        let rec = map_row(&location_only, MapperPolicy::Lenient).unwrap();
        assert_eq!(rec.personnel_id, "");
        assert_eq!(rec.full_name, "Onbekend");
        assert_eq!(rec.raw_date_text, "-");
    }

    #[test]
    fn driver_name_wins_over_an_earlier_teamcoach_column() {
        let row = Row::new()
            .with("Personeelsnr", "12")
            .with("Teamcoach", "Coach Claes")
            .with("Naam", "Jan Peeters");
        assert_eq!(map_row(&row, MapperPolicy::Lenient).unwrap().full_name, "Jan Peeters");

        let coach_only = Row::new().with("Personeelsnr", "12").with("Teamcoach", "Coach Claes");
        assert_eq!(map_row(&coach_only, MapperPolicy::Lenient).unwrap().full_name, "Coach Claes");
    }

    #[test]
    fn damage_kind_does_not_borrow_type_or_date_columns() {
        let row = Row::new()
            .with("Personeelsnr", "12")
            .with("Schadedatum", "01-01-2024")
            .with("Type", "gelede bus");
        let rec = map_row(&row, MapperPolicy::Lenient).unwrap();
        assert_eq!(rec.damage_kind, "Onbekend");
        assert_eq!(rec.vehicle_category, "Gelede");

        let described = row.with("Aard van de schade", "spiegel");
        assert_eq!(map_row(&described, MapperPolicy::Lenient).unwrap().damage_kind, "spiegel");
    }

    #[test]
    fn type_alone_does_not_keep_a_row() {
        let row = Row::new()
            .with("Personeelsnr", "")
            .with("Naam", "")
            .with("Datum", "")
            .with("Type", "standaard");
        assert!(map_row(&row, MapperPolicy::Lenient).is_none());
    }

    #[test]
    fn unparseable_date_keeps_original_text() {
        let row = Row::new().with("ID", "5").with("Datum", "ergens in mei");
        let rec = map_row(&row, MapperPolicy::Lenient).unwrap();
        assert_eq!(rec.parsed_date, None);
        assert_eq!(rec.raw_date_text, "ergens in mei");
    }

    #[test]
    fn strict_mapping_requires_personnel_number() {
        let location_only = Row::new().with("Locatie", "Gent");
        assert!(map_row(&location_only, MapperPolicy::Strict).is_none());

        let mut row = Row::new().with("personeelsnr", "").with("ID", "9").with("Type", "gelede");
        row.push("Datum", Cell::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
        let rec = map_row(&row, MapperPolicy::Strict).unwrap();
        assert_eq!(rec.personnel_id, "9");
        assert_eq!(rec.raw_date_text, "02-01-2024");
        assert_eq!(rec.vehicle_category, "Gelede");
        assert_eq!(rec.full_name, "Onbekend");
    }

    #[test]
    fn strict_mapping_ignores_fuzzy_spellings() {
        let row = Row::new().with("ID", "3").with("BestuurderNaam", "Jan").with("Datum", "2024-3-5");
        let rec = map_row(&row, MapperPolicy::Strict).unwrap();
        assert_eq!(rec.full_name, "Onbekend");
        assert_eq!(rec.raw_date_text, "2024-3-5");
        assert_eq!(rec.parsed_date, NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn batch_records_first_row_headers() {
        let rows = vec![
            incident("1", "A", "01-01-2024", "standaard bus"),
            Row::new().with("Leeg", ""),
        ];
        let batch = map_rows(&rows, MapperPolicy::Lenient);
        assert_eq!(batch.headers, vec!["ID", "Naam", "Datum", "Type"]);
        assert_eq!(batch.report.total_rows, 2);
        assert_eq!(batch.report.kept_rows, 1);
        assert_eq!(batch.report.dropped_rows, 1);
    }

    #[test]
    fn seniority_rows_need_both_numbers() {
        let mut numeric = Row::new();
        numeric.push("Dienstjaar", Cell::Number(7.0));
        numeric.push("Aantal", Cell::Number(3.0));
        let rows = vec![
            Row::new().with(" Dienstjaren ", "12.7").with("Schades", "2"),
            numeric,
            Row::new().with("Dienstjaren", "").with("Schades", "4"),
            Row::new().with("Naam", "X").with("Schades", "4"),
        ];
        let samples = seniority_samples(&rows);
        assert_eq!(
            samples,
            vec![
                SenioritySample { years_of_service: 12, damage_count: 2.0 },
                SenioritySample { years_of_service: 7, damage_count: 3.0 },
            ]
        );
        assert!(is_seniority_sheet("Schades - Dienstjaar"));
        assert!(is_seniority_sheet("schadesdienstjaar"));
        assert!(!is_seniority_sheet("BRON"));
    }

    #[test]
    fn refresh_fails_without_primary_sheet() {
        let source = MemorySource::default().with_sheet("schade met macro", "Blad1", vec![]);
        let err = refresh(&source, &Settings::default()).unwrap_err();
        assert!(matches!(err, ReportError::MissingSheet { ref sheet, .. } if sheet == "BRON"));

        let empty = MemorySource::default();
        assert!(matches!(
            refresh(&empty, &Settings::default()),
            Err(ReportError::MissingFile { .. })
        ));
    }

    #[test]
    fn refresh_degrades_missing_auxiliary_files() {
        let source = MemorySource::default().with_sheet(
            "schade met macro",
            "BRON",
            vec![incident("1", "A", "01-01-2024", "standaard bus")],
        );
        let snapshot = refresh(&source, &Settings::default()).unwrap();
        assert_eq!(snapshot.records.len(), 1);
        assert!(snapshot.seniority.is_empty());
        assert!(snapshot.index.personnel.is_empty());
        assert!(snapshot.index.users.is_empty());

        let states: Vec<(String, FileState)> =
            snapshot.statuses.iter().map(|s| (s.file.clone(), s.status)).collect();
        assert_eq!(states[0], ("schade met macro".to_string(), FileState::Success));
        assert!(states[1..].iter().all(|(_, s)| *s == FileState::NotFound));
        assert_eq!(states.len(), 6);
    }

    #[test]
    fn refresh_wires_every_dataset() {
        let mut source = MemorySource::default()
            .with_sheet(
                "schade met macro",
                "BRON",
                vec![incident("1", "A", "01-01-2024", "standaard bus").with("Opmerking", "spiegel")],
            )
            .with_sheet(
                "schade met macro",
                "Schades-Dienstjaar",
                vec![Row::new().with("Dienstjaren", "3").with("schades", "1")],
            )
            .with_sheet("Coachingslijst", "Coaching", vec![Row::new().with("P-nr", "1")])
            .with_sheet("Coachingslijst", "Voltooide coachings", vec![Row::new().with("P-nr", "2")])
            .with_sheet(
                "toegestaan_gebruik",
                "Blad1",
                vec![Row::new().with("Naam", "an").with("Paswoord", "pw")],
            )
            .with_sheet("Overzicht gesprekken (aangepast)", "Blad1", vec![Row::new().with("Nummer", "01")]);
        source
            .json
            .insert("personeelsficheGB.json".to_string(), json!([{"Personeelsnr": "1", "Naam": "A"}]));

        let snapshot = refresh(&source, &Settings::default()).unwrap();
        assert_eq!(snapshot.extra_headers, vec!["Opmerking"]);
        assert_eq!(snapshot.seniority.len(), 1);
        assert_eq!(snapshot.index.personnel.len(), 1);
        assert_eq!(snapshot.index.coaching.requested.len(), 1);
        assert_eq!(snapshot.index.coaching.completed.len(), 1);
        assert!(snapshot.index.authenticate("an", "pw"));
        assert_eq!(snapshot.index.filter_conversations("1").len(), 1);
        assert!(snapshot.statuses.iter().all(|s| s.status == FileState::Success));
    }
}
