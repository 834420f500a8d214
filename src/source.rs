// Where workbooks and JSON files come from.
//
// The pipeline only sees `Workbook`s and `serde_json::Value`s. A local
// directory stands in for the remote file share: every workbook is a folder
// of exported sheets, one `<sheet>.csv` or `<sheet>.json` file per tab.
use std::fs;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde_json::Value;
use tracing::debug;

use crate::error::ReportError;
use crate::types::{Cell, Row, Sheet, Workbook};

pub trait DataSource {
    /// `Ok(None)` when the workbook does not exist.
    fn workbook(&self, name: &str) -> Result<Option<Workbook>, ReportError>;

    /// `Ok(None)` when the file does not exist.
    fn json(&self, name: &str) -> Result<Option<Value>, ReportError>;
}

#[derive(Debug, Clone)]
pub struct LocalDirSource {
    root: PathBuf,
}

impl LocalDirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DataSource for LocalDirSource {
    fn workbook(&self, name: &str) -> Result<Option<Workbook>, ReportError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .map_err(|source| ReportError::Io { file: dir.display().to_string(), source })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| matches!(extension(p).as_deref(), Some("csv") | Some("json")))
            .collect();
        paths.sort();

        let mut sheets = Vec::with_capacity(paths.len());
        for path in paths {
            let sheet_name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let rows = match extension(&path).as_deref() {
                Some("json") => read_json_sheet(&path)?,
                _ => read_csv_sheet(&path)?,
            };
            debug!(workbook = name, sheet = %sheet_name, rows = rows.len(), "sheet decoded");
            sheets.push(Sheet { name: sheet_name, rows });
        }
        Ok(Some(Workbook { name: name.to_string(), sheets }))
    }

    fn json(&self, name: &str) -> Result<Option<Value>, ReportError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn read_json(path: &Path) -> Result<Value, ReportError> {
    let file = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| ReportError::Io { file: file.clone(), source })?;
    serde_json::from_str(&text).map_err(|source| ReportError::Json { file, source })
}

/// Header row becomes the keys; blank header cells are skipped.
pub fn read_csv_sheet(path: &Path) -> Result<Vec<Row>, ReportError> {
    let file = path.display().to_string();
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|source| ReportError::Csv { file: file.clone(), source })?;
    let headers = rdr
        .headers()
        .map_err(|source| ReportError::Csv { file: file.clone(), source })?
        .clone();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|source| ReportError::Csv { file: file.clone(), source })?;
        let mut row = Row::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            if header.trim().is_empty() {
                continue;
            }
            row.push(header, Cell::from_field(field));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// A JSON sheet is an array of row objects.
pub fn read_json_sheet(path: &Path) -> Result<Vec<Row>, ReportError> {
    let value = read_json(path)?;
    Ok(rows_from_json(&value))
}

pub fn rows_from_json(value: &Value) -> Vec<Row> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_object).map(Row::from_json_object).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("schade_report_source_{}_{}", std::process::id(), n));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn reads_csv_and_json_sheets_in_name_order() {
        let root = scratch_dir();
        let wb = root.join("schade met macro");
        fs::create_dir_all(&wb).unwrap();
        fs::write(wb.join("BRON.csv"), "Personeelsnr,Datum,,Locatie\n007,15-03-2024,x,Gent\n").unwrap();
        fs::write(wb.join("schades-dienstjaar.json"), r#"[{"Dienstjaren": 6, "schades": 2}]"#).unwrap();
        fs::write(wb.join("notes.txt"), "ignored").unwrap();

        let source = LocalDirSource::new(root.clone());
        let book = source.workbook("schade met macro").unwrap().unwrap();
        assert_eq!(book.sheets.len(), 2);
        assert_eq!(book.first_sheet().map(|s| s.name.as_str()), Some("BRON"));

        let bron = book.sheet("BRON").unwrap();
        assert_eq!(bron.rows[0].columns(), vec!["Personeelsnr", "Datum", "Locatie"]);
        assert_eq!(bron.rows[0].get("Personeelsnr"), Some(&Cell::Text("007".into())));

        let seniority = book.sheet("schades-dienstjaar").unwrap();
        assert_eq!(seniority.rows[0].get("Dienstjaren"), Some(&Cell::Number(6.0)));

        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn missing_files_are_none_and_bad_json_is_an_error() {
        let root = scratch_dir();
        fs::write(root.join("broken.json"), "{not json").unwrap();
        let source = LocalDirSource::new(root.clone());

        assert!(source.workbook("Coachingslijst").unwrap().is_none());
        assert!(source.json("personeelsficheGB.json").unwrap().is_none());
        assert!(matches!(source.json("broken.json"), Err(ReportError::Json { .. })));

        fs::remove_dir_all(&root).ok();
    }
}
