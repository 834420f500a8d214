// Lookups over the auxiliary datasets, keyed by personnel number.
//
// None of these are joined into the damage records up front; the dashboard
// asks for one driver at a time.
use std::collections::HashSet;

use serde_json::Value;

use crate::dates::format_date;
use crate::headers::{find_value, first_present_text};
use crate::types::{Cell, Row};
use crate::util::{canonical_id, ids_match};

const PERSONNEL_ID_KEYS: &[&str] = &[
    "PersoneelsNr",
    "personeelsnr",
    "Personeelsnr",
    "ID",
    "id",
    "Stamnummer",
    "stamnummer",
    "Personeels Nr",
];
const PERSONNEL_ID_HINTS: &[&str] = &["personeels", "stamnr", "id", "nummer"];
const COACHING_ID_KEYS: &[&str] = &["P-nr", "p-nr", "Personeelsnr", "PersoneelsNr"];
const CONVERSATION_ID_KEYS: &[&str] = &["Nummer", "nummer"];
const CONVERSATION_DATE_KEYS: &[&str] = &["Datum", "Datum gesprek"];
const USER_NAME_KEYS: &[&str] = &["Naam", "naam"];
const USER_PASSWORD_KEYS: &[&str] = &["Paswoord", "paswoord"];

/// One personnel directory entry. `key` is set when the directory was an
/// object keyed by personnel number.
#[derive(Debug, Clone)]
pub struct PersonnelEntry {
    pub key: Option<String>,
    pub fields: Row,
    is_record: bool,
}

impl PersonnelEntry {
    fn matches(&self, query: &str) -> bool {
        if !self.is_record {
            return false;
        }
        let id = first_present_text(&self.fields, PERSONNEL_ID_KEYS);
        if ids_match(&id, query) {
            return true;
        }
        self.fields.iter().any(|(column, cell)| {
            let column = column.to_lowercase();
            PERSONNEL_ID_HINTS.iter().any(|h| column.contains(h)) && ids_match(&cell.as_text(), query)
        })
    }
}

/// Personnel directory normalized from either a JSON array of objects or
/// an object of objects.
#[derive(Debug, Clone, Default)]
pub struct PersonnelDirectory {
    entries: Vec<PersonnelEntry>,
}

impl PersonnelDirectory {
    pub fn from_json(value: &Value) -> Self {
        let entries = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_object())
                .map(|obj| PersonnelEntry {
                    key: None,
                    fields: Row::from_json_object(obj),
                    is_record: true,
                })
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| match item.as_object() {
                    Some(obj) => PersonnelEntry {
                        key: Some(key.clone()),
                        fields: Row::from_json_object(obj),
                        is_record: true,
                    },
                    None => {
                        let mut fields = Row::new();
                        fields.push(key.clone(), Cell::from_json(item));
                        PersonnelEntry { key: Some(key.clone()), fields, is_record: false }
                    }
                })
                .collect(),
            _ => Vec::new(),
        };
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A directory key equal to the query wins over any field match.
    pub fn find(&self, query: &str) -> Option<&PersonnelEntry> {
        if query.trim().is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.key.as_deref().is_some_and(|k| ids_match(k, query)))
            .or_else(|| self.entries.iter().find(|e| e.matches(query)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoachingLists {
    pub requested: Vec<Row>,
    pub completed: Vec<Row>,
}

#[derive(Debug, Default)]
pub struct CoachingMatches<'a> {
    pub requested: Vec<&'a Row>,
    pub completed: Vec<&'a Row>,
}

impl CoachingMatches<'_> {
    pub fn is_empty(&self) -> bool {
        self.requested.is_empty() && self.completed.is_empty()
    }
}

fn coaching_id(row: &Row) -> String {
    first_present_text(row, COACHING_ID_KEYS)
}

fn id_set(rows: &[Row]) -> HashSet<String> {
    rows.iter()
        .map(coaching_id)
        .filter(|id| !id.is_empty())
        .map(|id| canonical_id(&id))
        .collect()
}

impl CoachingLists {
    /// Canonical ids of drivers with a finished coaching.
    pub fn completed_ids(&self) -> HashSet<String> {
        id_set(&self.completed)
    }

    /// Canonical ids of drivers with a requested or planned coaching.
    pub fn requested_ids(&self) -> HashSet<String> {
        id_set(&self.requested)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizedUser {
    pub name: String,
    pub password: String,
}

impl AuthorizedUser {
    pub fn from_row(row: &Row) -> Self {
        Self {
            name: first_present_text(row, USER_NAME_KEYS),
            password: first_present_text(row, USER_PASSWORD_KEYS),
        }
    }
}

/// Date column of a conversation row, formatted for display.
pub fn conversation_date(row: &Row) -> String {
    find_value(row, CONVERSATION_DATE_KEYS, true)
        .map(format_date)
        .unwrap_or_else(|| "-".to_string())
}

#[derive(Debug, Clone, Default)]
pub struct CrossReferenceIndex {
    pub personnel: PersonnelDirectory,
    pub coaching: CoachingLists,
    pub conversations: Vec<Row>,
    pub users: Vec<AuthorizedUser>,
}

impl CrossReferenceIndex {
    pub fn find_personnel(&self, query: &str) -> Option<&PersonnelEntry> {
        self.personnel.find(query)
    }

    pub fn filter_coaching(&self, query: &str) -> CoachingMatches<'_> {
        if query.trim().is_empty() {
            return CoachingMatches::default();
        }
        let hit = |row: &&Row| ids_match(&coaching_id(row), query);
        CoachingMatches {
            requested: self.coaching.requested.iter().filter(hit).collect(),
            completed: self.coaching.completed.iter().filter(hit).collect(),
        }
    }

    pub fn filter_conversations(&self, query: &str) -> Vec<&Row> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        self.conversations
            .iter()
            .filter(|row| ids_match(&first_present_text(row, CONVERSATION_ID_KEYS), query))
            .collect()
    }

    /// Plain name/password comparison against the authorised-user sheet.
    pub fn authenticate(&self, user: &str, password: &str) -> bool {
        if user.is_empty() || password.is_empty() {
            return false;
        }
        self.users.iter().any(|u| u.name == user && u.password == password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index() -> CrossReferenceIndex {
        CrossReferenceIndex {
            personnel: PersonnelDirectory::from_json(&json!([
                {"Personeelsnr": "0012", "Naam": "Peeters"},
                {"Stamnr Chauffeur": "77", "Naam": "Janssens"}
            ])),
            coaching: CoachingLists {
                requested: vec![Row::new().with("P-nr", "007").with("Onderwerp", "spiegels")],
                completed: vec![
                    Row::new().with("Personeelsnr", "8"),
                    Row::new().with("P-nr", "7").with("Datum coaching", "01-02-2024"),
                ],
            },
            conversations: vec![
                Row::new().with("Nummer", "07").with("Datum", "2024-05-01"),
                Row::new().with("Nummer", "70"),
            ],
            users: vec![AuthorizedUser { name: "an".into(), password: "geheim".into() }],
        }
    }

    #[test]
    fn personnel_lookup_ignores_leading_zeros() {
        let idx = index();
        let hit = idx.find_personnel("12").unwrap();
        assert_eq!(hit.fields.get("Naam").map(Cell::as_text), Some("Peeters".to_string()));
        assert!(idx.find_personnel("13").is_none());
        assert!(idx.find_personnel("  ").is_none());
    }

    #[test]
    fn personnel_lookup_falls_back_to_id_like_columns() {
        let idx = index();
        let hit = idx.find_personnel("077").unwrap();
        assert_eq!(hit.fields.get("Naam").map(Cell::as_text), Some("Janssens".to_string()));
    }

    #[test]
    fn keyed_directory_matches_on_key_first() {
        let dir = PersonnelDirectory::from_json(&json!({
            "0042": {"Naam": "Claes"},
            "99": {"Naam": "Wouters", "ID": "42"}
        }));
        let hit = dir.find("42").unwrap();
        assert_eq!(hit.key.as_deref(), Some("0042"));
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn coaching_filter_uses_same_comparison() {
        let idx = index();
        let m = idx.filter_coaching("7");
        assert_eq!(m.requested.len(), 1);
        assert_eq!(m.completed.len(), 1);
        assert!(idx.filter_coaching("").is_empty());
        assert!(idx.coaching.completed_ids().contains("7"));
        assert!(idx.coaching.requested_ids().contains("7"));
    }

    #[test]
    fn conversations_filter_on_nummer() {
        let idx = index();
        let rows = idx.filter_conversations("7");
        assert_eq!(rows.len(), 1);
        assert_eq!(conversation_date(rows[0]), "01-05-2024");
    }

    #[test]
    fn authentication_is_exact() {
        let idx = index();
        assert!(idx.authenticate("an", "geheim"));
        assert!(!idx.authenticate("An", "geheim"));
        assert!(!idx.authenticate("an", "geheim "));
        assert!(!idx.authenticate("", ""));
    }
}
