//! Loading CSV and Parquet files into DuckDB tables.
//!
//! Schema inference is left entirely to DuckDB's readers
//! (`read_csv_auto`, `read_parquet`). Loading a file under a name that is
//! already taken replaces the existing table.

use duckdb::params;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::{self, quote_ident, sanitize_table_name, Database};
use crate::error::{LoaderError, Result};
use crate::models::LoadedTable;

/// File formats the loader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Parquet,
}

impl SourceFormat {
    /// Matches a bare extension (no dot), case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "parquet" => Some(SourceFormat::Parquet),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_extension(&ext).ok_or(LoaderError::UnsupportedFormat { extension: ext })
    }

    fn reader_function(self) -> &'static str {
        match self {
            SourceFormat::Csv => "read_csv_auto",
            SourceFormat::Parquet => "read_parquet",
        }
    }
}

/// Loads `path` into the table `table_name` (or the file stem when `None`
/// or blank), returning the sanitized name and inferred columns.
pub fn load_table(db: &Database, path: &Path, table_name: Option<&str>) -> Result<LoadedTable> {
    let format = SourceFormat::from_path(path)?;

    let source = resolve_source(path)?;

    let requested = match table_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    };
    let table = sanitize_table_name(&requested)?;

    let (columns, row_count) = db.with_connection(|conn| {
        let sql = format!(
            "CREATE OR REPLACE TABLE {} AS SELECT * FROM {}({})",
            quote_ident(&table),
            format.reader_function(),
            quote_literal(&source.to_string_lossy())
        );
        conn.execute_batch(&sql).map_err(|e| LoaderError::Load {
            path: source.clone(),
            detail: e.to_string(),
        })?;

        let columns = db::describe_table(conn, &table)?;
        let row_count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(&table)),
                params![],
                |row| row.get(0),
            )
            .map_err(|e| LoaderError::Query(e.to_string()))?;
        Ok((columns, row_count.max(0) as u64))
    })?;

    info!(
        table = %table,
        source = %source.display(),
        columns = columns.len(),
        rows = row_count,
        "Loaded table"
    );

    Ok(LoadedTable {
        table_name: table,
        source_path: source,
        columns,
        row_count,
    })
}

fn resolve_source(path: &Path) -> Result<PathBuf> {
    let source = path
        .canonicalize()
        .map_err(|_| LoaderError::FileNotFound(path.to_path_buf()))?;
    if !source.is_file() {
        return Err(LoaderError::FileNotFound(path.to_path_buf()));
    }
    // Surface permission problems as "not readable" instead of an engine error.
    std::fs::File::open(&source).map_err(|_| LoaderError::FileNotFound(path.to_path_buf()))?;
    Ok(source)
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("csv"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(
            SourceFormat::from_extension("Parquet"),
            Some(SourceFormat::Parquet)
        );
        assert_eq!(SourceFormat::from_extension("json"), None);
        assert_eq!(SourceFormat::from_extension(""), None);
    }

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(
            SourceFormat::from_path(Path::new("/data/x.parquet")).unwrap(),
            SourceFormat::Parquet
        );
        match SourceFormat::from_path(Path::new("/data/notes.txt")) {
            Err(LoaderError::UnsupportedFormat { extension }) => assert_eq!(extension, "txt"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
        assert!(SourceFormat::from_path(Path::new("/data/README")).is_err());
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("/tmp/a.csv"), "'/tmp/a.csv'");
        assert_eq!(quote_literal("/tmp/o'neil.csv"), "'/tmp/o''neil.csv'");
    }

    #[test]
    fn test_missing_file() {
        let db = Database::open_in_memory().unwrap();
        let err = load_table(&db, Path::new("/definitely/not/here.csv"), None).unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("looks_like.csv");
        std::fs::create_dir(&dir).unwrap();
        let db = Database::open_in_memory().unwrap();
        let err = load_table(&db, &dir, Some("t")).unwrap_err();
        assert!(matches!(err, LoaderError::FileNotFound(_)));
    }
}
