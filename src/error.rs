//! Error types for browsing, loading, and querying.
//!
//! Each component reports failures through [`LoaderError`]; the HTTP layer
//! maps variants onto status codes in one place (see `server.rs`). Nothing
//! here is retried and no variant is fatal to the server.

use std::path::PathBuf;

/// Errors from the path browser, table loader, and query executor.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The path does not exist, is not readable, or lies outside the
    /// configured browse root.
    #[error("cannot access {}: {reason}", .path.display())]
    Access { path: PathBuf, reason: String },

    /// A directory listing was requested for a regular file.
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The file extension is neither `.csv` nor `.parquet`.
    #[error("unsupported file format '{extension}': only .csv and .parquet files are supported")]
    UnsupportedFormat { extension: String },

    /// The load path does not resolve to a readable file.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// DuckDB failed to parse or infer a schema for the source file.
    #[error("failed to load {}: {detail}", .path.display())]
    Load { path: PathBuf, detail: String },

    /// The SQL statement failed. The inner string is the engine's message.
    #[error("{0}")]
    Query(String),

    /// The table name is empty once illegal characters are removed.
    #[error("invalid table name: '{0}'")]
    InvalidTableName(String),

    /// Opening or switching the database connection failed.
    #[error("database connection failed: {0}")]
    Connect(String),

    /// A request argument was out of range or malformed.
    #[error("{0}")]
    InvalidArgument(String),

    /// Filesystem failure outside of browsing (e.g. writing a sample file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    /// Create an `Access` error for `path`.
    pub fn access(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Access {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a `Query` error, keeping a preview of the offending SQL.
    pub fn query(sql: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if sql.is_empty() {
            return Self::Query(detail);
        }
        let preview: String = sql.chars().take(120).collect();
        let ellipsis = if preview.len() < sql.len() { "..." } else { "" };
        Self::Query(format!("{} (query: {}{})", detail, preview, ellipsis))
    }

    /// Short machine-readable code, used in JSON error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            LoaderError::Access { .. } => "forbidden",
            LoaderError::NotADirectory(_) => "bad_request",
            LoaderError::UnsupportedFormat { .. } => "unsupported_format",
            LoaderError::FileNotFound(_) => "not_found",
            LoaderError::Load { .. } => "load_error",
            LoaderError::Query(_) => "query_error",
            LoaderError::InvalidTableName(_) | LoaderError::InvalidArgument(_) => "bad_request",
            LoaderError::Connect(_) | LoaderError::Io(_) => "internal",
        }
    }
}

/// A specialised `Result` type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
