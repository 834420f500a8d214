use serde::Deserialize;

use crate::error::ReportError;
use crate::loader::MapperPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub mapper: MapperSettings,
    pub output: OutputSettings,
}

/// File and sheet names on the share. The defaults are the names the back
/// office actually uses.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataSettings {
    pub dir: String,
    pub primary_workbook: String,
    pub primary_sheet: String,
    pub personnel_file: String,
    pub coaching_workbook: String,
    pub coaching_requested_sheet: String,
    pub coaching_completed_sheet: String,
    pub users_workbook: String,
    pub conversations_workbook: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: "data".to_string(),
            primary_workbook: "schade met macro".to_string(),
            primary_sheet: "BRON".to_string(),
            personnel_file: "personeelsficheGB.json".to_string(),
            coaching_workbook: "Coachingslijst".to_string(),
            coaching_requested_sheet: "Coaching".to_string(),
            coaching_completed_sheet: "Voltooide coachings".to_string(),
            users_workbook: "toegestaan_gebruik".to_string(),
            conversations_workbook: "Overzicht gesprekken (aangepast)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MapperSettings {
    pub policy: MapperPolicy,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { dir: ".".to_string() }
    }
}

/// Defaults, then `config/report.toml` if present, then `SCHADE_*`
/// environment variables (`SCHADE_DATA__DIR=/mnt/share`).
pub fn load_settings() -> Result<Settings, ReportError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/report").required(false))
        .add_source(config::Environment::with_prefix("SCHADE").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let settings: Settings = config::Config::builder()
            .add_source(config::File::from_str(
                "[data]\ndir = \"/srv/share\"\n[mapper]\npolicy = \"strict\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.data.dir, "/srv/share");
        assert_eq!(settings.data.primary_sheet, "BRON");
        assert_eq!(settings.mapper.policy, MapperPolicy::Strict);
        assert_eq!(settings.output.dir, ".");
    }
}
