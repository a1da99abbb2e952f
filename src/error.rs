use thiserror::Error;

/// Failures of the snapshot store's backing database or filesystem.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare database location: {0}")]
    Io(#[source] std::io::Error),

    #[error("failed to encode column value: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Malformed input rejected before anything is written.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate { value: String },

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid rank {rank} for '{name}': ranks start at 1")]
    InvalidRank { name: String, rank: u32 },

    #[error("install count {installs} for '{name}' does not fit the store")]
    InstallsOutOfRange { name: String, installs: u64 },

    #[error("duplicate name '{name}' in one batch")]
    DuplicateName { name: String },
}

/// Settings file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to write settings file: {0}")]
    WriteFile(#[source] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("collaborator failed: {0}")]
    Collaborator(String),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(StorageError::Sqlite(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
