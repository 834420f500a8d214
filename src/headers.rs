// Column lookup for spreadsheets whose headers drift between exports
// ("Personeelsnr", "personeels nr", "Personeels-Nr", ...).
use crate::types::{Cell, Row};

/// Columns already shown as dedicated fields; everything else on the first
/// row is rendered as a passthrough column.
const EXCLUDED_HEADERS: &[&str] = &[
    "personeelsnr",
    "id",
    "stamnr",
    "naam",
    "chauffeur",
    "bestuurder",
    "volledige naam",
    "datum",
    "bus/tram",
    "voertuig",
    "type",
    "link",
    "teamcoach",
];

/// Lower-case and drop whitespace, hyphens and underscores.
pub fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Locate a logical field in `row` given its known spellings.
///
/// The exact pass compares normalized names; the aggressive pass (only when
/// requested and the exact pass found nothing) accepts a column whose name
/// contains a candidate or is contained by one. Both passes walk the row in
/// its own column order, so the first matching column wins.
pub fn find_value<'a>(row: &'a Row, candidates: &[&str], aggressive: bool) -> Option<&'a Cell> {
    resolve(row, candidates, aggressive, &[])
}

/// Aggressive lookup that never takes a column spelled exactly like one of
/// `taken`, the spellings that belong to other fields.
pub fn find_value_except<'a>(row: &'a Row, candidates: &[&str], taken: &[&[&str]]) -> Option<&'a Cell> {
    resolve(row, candidates, true, taken)
}

fn resolve<'a>(row: &'a Row, candidates: &[&str], aggressive: bool, taken: &[&[&str]]) -> Option<&'a Cell> {
    let wanted: Vec<String> = candidates.iter().map(|c| normalize_header(c)).collect();

    let exact = row.iter().find(|(column, _)| {
        let column = normalize_header(column);
        wanted.iter().any(|w| *w == column)
    });
    if let Some((_, cell)) = exact {
        return Some(cell);
    }
    if !aggressive {
        return None;
    }

    let taken: Vec<String> = taken.iter().flat_map(|keys| keys.iter()).map(|k| normalize_header(k)).collect();
    row.iter()
        .find(|(column, _)| {
            let column = normalize_header(column);
            !column.is_empty()
                && !taken.contains(&column)
                && wanted
                    .iter()
                    .any(|w| !w.is_empty() && (column.contains(w.as_str()) || w.contains(column.as_str())))
        })
        .map(|(_, cell)| cell)
}

/// Resolved value as trimmed text, empty when absent.
pub fn find_text(row: &Row, candidates: &[&str], aggressive: bool) -> String {
    find_value(row, candidates, aggressive)
        .map(|c| c.as_text().trim().to_string())
        .unwrap_or_default()
}

/// Legacy lookup chain: the first exact key holding a non-blank value.
pub fn first_present<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Cell> {
    keys.iter().filter_map(|k| row.get(k)).find(|c| !c.is_blank())
}

pub fn first_present_text(row: &Row, keys: &[&str]) -> String {
    first_present(row, keys)
        .map(|c| c.as_text().trim().to_string())
        .unwrap_or_default()
}

fn is_excluded_header(header: &str) -> bool {
    let h = header.trim().to_lowercase();
    EXCLUDED_HEADERS.contains(&h.as_str())
}

/// Columns of the first row that are not covered by a dedicated field.
pub fn passthrough_headers(headers: &[String]) -> Vec<String> {
    headers.iter().filter(|h| !is_excluded_header(h)).cloned().collect()
}

/// Render the passthrough columns of a row, `-` for blanks.
pub fn passthrough(row: &Row, headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| match row.get(h) {
            Some(c) if !c.is_blank() => c.as_text(),
            _ => "-".to_string(),
        })
        .collect()
}
