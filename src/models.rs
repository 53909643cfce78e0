//! Core data models shared by the browser, loader, query executor, and
//! HTTP layer.
//!
//! None of these are persisted: listings and query results are built per
//! request, and [`LoadedTable`] mirrors state owned by DuckDB.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::path::PathBuf;

/// One file or directory directly inside a browsed path.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FileSystemEntry {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    /// Size in bytes; `None` for directories.
    pub size: Option<u64>,
    /// Lowercase extension without the dot; `None` for directories and
    /// extensionless files.
    pub extension: Option<String>,
    /// Last modification time (RFC 3339), when the platform reports it.
    pub modified: Option<String>,
    /// Whether the table loader accepts this file.
    pub loadable: bool,
}

/// The result of browsing a directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryListing {
    pub path: PathBuf,
    /// Parent directory, omitted at the filesystem root or the browse root.
    pub parent: Option<PathBuf>,
    /// Directories first, then files; each group sorted by name.
    pub entries: Vec<FileSystemEntry>,
}

/// A column as reported by DuckDB's `DESCRIBE`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
}

/// A table registered from a source file.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTable {
    pub table_name: String,
    pub source_path: PathBuf,
    pub columns: Vec<ColumnInfo>,
    pub row_count: u64,
}

/// The outcome of executing one SQL statement.
#[derive(Debug, Clone, Serialize, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
    pub row_count: usize,
    /// `true` when the row limit cut the result short.
    pub truncated: bool,
    /// Set for statements that produce no result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub elapsed_ms: u64,
}
