use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Merge invoked without a ROW after the start index. Callers must check
    /// for a target first, so this is a programming error.
    #[error("no ROW target after index {start} to merge truncated rows into")]
    MissingMergeTarget { start: usize },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
