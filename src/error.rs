use thiserror::Error;

/// Failures that reach the caller of a refresh. Auxiliary files never end up
/// here; they degrade to an empty dataset with a recorded status instead.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("sheet \"{sheet}\" not found in workbook \"{workbook}\"")]
    MissingSheet { workbook: String, sheet: String },

    #[error("file \"{file}\" not found")]
    MissingFile { file: String },

    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("invalid JSON in {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
