//! The DuckDB database handle and table catalog.
//!
//! A [`Database`] owns exactly one DuckDB connection behind a mutex. Every
//! component receives the handle explicitly; there is no global connection.
//! The handle is opened at server start, can be re-pointed with
//! [`Database::connect`], and closes when dropped.
//!
//! All statements go through [`Database::with_connection`], so database
//! work is serialized process-wide. Callers on an async runtime should run
//! these methods on the blocking pool.

use duckdb::{params, Connection};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{Config, DbMode};
use crate::error::{LoaderError, Result};
use crate::models::ColumnInfo;

struct Handle {
    conn: Connection,
    mode: DbMode,
    path: Option<PathBuf>,
}

pub struct Database {
    inner: Mutex<Handle>,
}

impl Database {
    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(open_handle(DbMode::Memory, None)?),
        })
    }

    /// Opens the database described by `[db]`.
    pub fn open(config: &Config) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(open_handle(config.db.mode, config.db.path.as_deref())?),
        })
    }

    /// Replaces the current connection. Tables loaded into an in-memory
    /// database are lost; a file database keeps them on disk.
    ///
    /// The new database is opened before the old one is released, so a
    /// failed connect leaves the current tables in place. Reopening the file
    /// that is already open has to release it first, since DuckDB refuses a
    /// file another instance in this process still holds.
    pub fn connect(&self, mode: DbMode, path: Option<&Path>) -> Result<()> {
        let mut inner = self.inner.lock();
        let reopening = mode == DbMode::File
            && matches!((inner.path.as_deref(), path), (Some(a), Some(b)) if same_file(a, b));

        if !reopening {
            *inner = open_handle(mode, path)?;
            return Ok(());
        }

        let placeholder = Handle {
            conn: Connection::open_in_memory()
                .map_err(|e| LoaderError::Connect(e.to_string()))?,
            mode: DbMode::Memory,
            path: None,
        };
        drop(std::mem::replace(&mut *inner, placeholder));
        *inner = open_handle(mode, path)?;
        Ok(())
    }

    pub fn mode(&self) -> DbMode {
        self.inner.lock().mode
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.inner.lock().path.clone()
    }

    /// Runs `f` while holding the connection lock.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let inner = self.inner.lock();
        f(&inner.conn)
    }

    /// Names of all tables in the `main` schema, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>> {
        self.with_connection(list_tables)
    }

    /// Column names and types of `table`, in declaration order.
    pub fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.with_connection(|conn| describe_table(conn, table))
    }

    /// Every table with its columns, read under one lock so a concurrent
    /// rename cannot slip in between the listing and the describes.
    pub fn table_schemas(&self) -> Result<Vec<(String, Vec<ColumnInfo>)>> {
        self.with_connection(|conn| {
            list_tables(conn)?
                .into_iter()
                .map(|table| {
                    let columns = describe_table(conn, &table)?;
                    Ok((table, columns))
                })
                .collect()
        })
    }

    /// Renames a table. Both names go through the same sanitizer as loads.
    pub fn rename_table(&self, old: &str, new: &str) -> Result<()> {
        let old = sanitize_table_name(old)?;
        let new = sanitize_table_name(new)?;
        self.with_connection(|conn| {
            let sql = format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_ident(&old),
                quote_ident(&new)
            );
            conn.execute_batch(&sql)
                .map_err(|e| LoaderError::query(&sql, e.to_string()))?;
            info!(old = %old, new = %new, "Renamed table");
            Ok(())
        })
    }

    /// Drops a table if it exists.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        let table = sanitize_table_name(table)?;
        self.with_connection(|conn| {
            let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(&table));
            conn.execute_batch(&sql)
                .map_err(|e| LoaderError::query(&sql, e.to_string()))?;
            info!(table = %table, "Dropped table");
            Ok(())
        })
    }
}

fn open_handle(mode: DbMode, path: Option<&Path>) -> Result<Handle> {
    let (conn, path) = match mode {
        DbMode::Memory => {
            let conn = Connection::open_in_memory().map_err(|e| {
                LoaderError::Connect(format!("failed to open in-memory database: {}", e))
            })?;
            (conn, None)
        }
        DbMode::File => {
            let path = path.ok_or_else(|| {
                LoaderError::InvalidArgument("db_path required for file mode".to_string())
            })?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path).map_err(|e| {
                LoaderError::Connect(format!("failed to open {}: {}", path.display(), e))
            })?;
            (conn, Some(path.to_path_buf()))
        }
    };

    // The bundled build ships the parquet reader; never try to download
    // extensions at runtime.
    if let Err(e) = conn.execute_batch(
        "SET autoinstall_known_extensions=false; SET autoload_known_extensions=true;",
    ) {
        warn!(error = %e, "Failed to configure extension loading");
    }

    match &path {
        Some(p) => info!(path = %p.display(), "Opened DuckDB file database"),
        None => info!("Opened DuckDB in-memory database"),
    }

    Ok(Handle { conn, mode, path })
}

/// Compares two database paths, resolving them when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )
        .map_err(|e| LoaderError::Query(e.to_string()))?;
    let rows = stmt
        .query_map(params![], |row| row.get::<_, String>(0))
        .map_err(|e| LoaderError::Query(e.to_string()))?;
    rows.collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LoaderError::Query(e.to_string()))
}

pub(crate) fn describe_table(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn
        .prepare(
            "SELECT column_name, data_type FROM information_schema.columns \
             WHERE table_schema = 'main' AND table_name = ? ORDER BY ordinal_position",
        )
        .map_err(|e| LoaderError::Query(e.to_string()))?;
    let rows = stmt
        .query_map(params![table], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
            })
        })
        .map_err(|e| LoaderError::Query(e.to_string()))?;
    let columns = rows
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| LoaderError::Query(e.to_string()))?;

    if columns.is_empty() {
        return Err(LoaderError::Query(format!("table not found: {}", table)));
    }
    debug!(table = %table, columns = columns.len(), "Described table");
    Ok(columns)
}

/// Turns arbitrary input into a legal, unquoted-safe table name.
///
/// Characters other than ASCII alphanumerics and `_` become `_`; a leading
/// digit gets a `t_` prefix. Names that are empty after trimming are
/// rejected.
pub fn sanitize_table_name(name: &str) -> Result<String> {
    let clean: String = name
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if clean.is_empty() {
        return Err(LoaderError::InvalidTableName(name.to_string()));
    }
    if clean.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(format!("t_{}", clean));
    }
    Ok(clean)
}

/// Double-quotes a sanitized identifier so keywords like `order` stay usable.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
