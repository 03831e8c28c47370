//! Custom error types for cmg-migrate

use thiserror::Error;

/// Main error type for migration operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid dump {file}: {message}")]
    InvalidDump { file: String, message: String },

    #[error("Missing required field '{field}' on {entity}")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("No dataset found for CMG record {0}")]
    DatasetNotFound(String),

    #[error("Ambiguous match for CMG record {source_id}: {candidates} candidates tied at score {score}")]
    AmbiguousMatch {
        source_id: String,
        candidates: usize,
        score: u8,
    },

    #[error("Could not find a free name for '{name}' after {attempts} attempts")]
    NameProbeExhausted { name: String, attempts: u32 },

    #[error("Not initialized: run 'cmg-migrate init' first")]
    NotInitialized,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error only invalidates the record being converted.
    ///
    /// Record-level errors are logged and the pass moves on; everything else
    /// aborts the run.
    pub fn is_record_level(&self) -> bool {
        match self {
            Error::MissingField { .. }
            | Error::DatasetNotFound(_)
            | Error::AmbiguousMatch { .. }
            | Error::NameProbeExhausted { .. } => true,
            Error::Database(sqlx::Error::Database(db_err)) => !matches!(
                db_err.kind(),
                sqlx::error::ErrorKind::Other
            ),
            _ => false,
        }
    }

    /// Short, stable label used in reports
    pub fn reason(&self) -> &'static str {
        match self {
            Error::MissingField { .. } => "missing-field",
            Error::DatasetNotFound(_) => "not-found",
            Error::AmbiguousMatch { .. } => "ambiguous",
            Error::NameProbeExhausted { .. } => "name-exhausted",
            Error::Database(sqlx::Error::Database(db_err))
                if !matches!(db_err.kind(), sqlx::error::ErrorKind::Other) =>
            {
                "constraint"
            }
            _ => "fatal",
        }
    }
}

/// Result type alias for cmg-migrate
pub type Result<T> = std::result::Result<T, Error>;
