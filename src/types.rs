use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

/// Sentinel used for names, damage kinds and vehicle modes that could not be
/// resolved from a row.
pub const UNKNOWN: &str = "Onbekend";

/// Fallback vehicle category when the type column is empty.
pub const OTHER_CATEGORY: &str = "Overig";

/// A single decoded spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    /// Build a cell from a raw CSV field. CSV carries no type information so
    /// everything non-blank stays text.
    pub fn from_field(field: &str) -> Self {
        if field.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(field.to_string())
        }
    }

    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Cell::Empty,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Empty),
            Value::String(s) if s.trim().is_empty() => Cell::Empty,
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    /// True for blank cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// String rendering used everywhere a cell is shown or compared as text.
    /// Whole numbers print without a fraction so numeric ids stay readable.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Date(d) => d.format("%d-%m-%Y").to_string(),
        }
    }
}

/// One spreadsheet row: column label to cell, in the sheet's column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.push((column.into(), cell));
    }

    #[cfg(test)]
    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.push(column, Cell::from_field(value));
        self
    }

    pub fn from_json_object(map: &serde_json::Map<String, Value>) -> Self {
        let mut row = Row::new();
        for (k, v) in map {
            row.push(k.clone(), Cell::from_json(v));
        }
        row
    }

    /// Exact column lookup.
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn columns(&self) -> Vec<String> {
        self.cells.iter().map(|(c, _)| c.clone()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub name: String,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn first_sheet(&self) -> Option<&Sheet> {
        self.sheets.first()
    }

    /// Find a sheet whose name matches `pred`, in workbook order.
    pub fn find_sheet(&self, pred: impl Fn(&str) -> bool) -> Option<&Sheet> {
        self.sheets.iter().find(|s| pred(&s.name))
    }
}

/// Canonical, source-agnostic representation of one incident row.
#[derive(Debug, Clone)]
pub struct DamageRecord {
    pub personnel_id: String,
    pub full_name: String,
    pub location: String,
    pub raw_date_text: String,
    pub parsed_date: Option<NaiveDate>,
    pub link: String,
    pub vehicle_category: String,
    pub damage_kind: String,
    pub vehicle_mode: String,
    pub source_row: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SenioritySample {
    pub years_of_service: i64,
    pub damage_count: f64,
}

#[derive(Debug, Clone, Serialize, Tabled, PartialEq)]
pub struct SeniorityBin {
    #[serde(rename = "Dienstjaren")]
    #[tabled(rename = "Dienstjaren")]
    pub label: String,
    #[serde(rename = "GemiddeldeSchades")]
    #[tabled(rename = "GemiddeldeSchades")]
    pub average_damages: f64,
    #[serde(rename = "Personen")]
    #[tabled(rename = "Personen")]
    pub person_count: usize,
    #[serde(skip)]
    #[tabled(skip)]
    pub sort_key: i64,
}

#[derive(Debug, Clone, Serialize, Tabled, PartialEq)]
pub struct CountRow {
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub value: usize,
}

/// One calendar month with an incident count per year present in the data.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyRow {
    pub month: String,
    pub counts: Vec<(i32, usize)>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonthlyMatrix {
    pub years: Vec<i32>,
    pub rows: Vec<MonthlyRow>,
}

#[derive(Debug, Clone, Serialize, Tabled, PartialEq)]
pub struct EligibleDriver {
    #[serde(rename = "Personeelsnr")]
    #[tabled(rename = "Personeelsnr")]
    pub personnel_id: String,
    #[serde(rename = "Naam")]
    #[tabled(rename = "Naam")]
    pub full_name: String,
    #[serde(rename = "Schades")]
    #[tabled(rename = "Schades")]
    pub count: usize,
    #[serde(rename = "Gepland")]
    #[tabled(rename = "Gepland")]
    pub is_planned: bool,
}

#[derive(Debug, Clone, Serialize, Tabled, PartialEq)]
pub struct DriverTally {
    #[serde(rename = "Personeelsnr")]
    #[tabled(rename = "Personeelsnr")]
    pub personnel_id: String,
    #[serde(rename = "Naam")]
    #[tabled(rename = "Naam")]
    pub full_name: String,
    #[serde(rename = "Schades")]
    #[tabled(rename = "Schades")]
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_incidents: usize,
    pub by_type: Vec<CountRow>,
    pub by_vehicle: Vec<CountRow>,
    pub by_location: Vec<CountRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Success,
    Error,
    NotFound,
}

/// Advisory per-file fetch outcome shown to the operator.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileStatus {
    pub file: String,
    pub status: FileState,
    pub message: Option<String>,
}

impl FileStatus {
    pub fn success(file: &str) -> Self {
        Self { file: file.to_string(), status: FileState::Success, message: None }
    }

    pub fn not_found(file: &str, message: impl Into<String>) -> Self {
        Self { file: file.to_string(), status: FileState::NotFound, message: Some(message.into()) }
    }

    pub fn error(file: &str, message: impl Into<String>) -> Self {
        Self { file: file.to_string(), status: FileState::Error, message: Some(message.into()) }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_incidents: usize,
    pub unique_drivers: usize,
    pub eligible_for_coaching: usize,
    pub planned_coachings: usize,
    pub dated_incidents: usize,
}
