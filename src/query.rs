//! SQL execution against the loaded tables.
//!
//! Any statement is accepted. `SELECT` and `WITH` queries are wrapped in an
//! outer `LIMIT` so a careless `SELECT *` over a large table cannot pull
//! everything into memory; other statements run verbatim and their result
//! set, if any, is capped at the same limit while fetching.
//!
//! Values are converted to JSON for the browser UI: scalars as JSON scalars,
//! `LIST`/`ARRAY` as arrays, `STRUCT`/`MAP` as objects.

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::params;
use duckdb::types::{TimeUnit, Value, ValueRef};
use serde_json::Value as JsonValue;
use std::time::Instant;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{LoaderError, Result};
use crate::models::QueryResult;

/// Runs `sql` and materializes at most `max_rows` rows.
///
/// Engine failures (syntax errors, unknown tables, type mismatches) come
/// back as [`LoaderError::Query`] with DuckDB's message; nothing is retried.
pub fn run_query(db: &Database, sql: &str, max_rows: usize) -> Result<QueryResult> {
    let start = Instant::now();

    let sql = normalize_sql(sql);
    if sql.is_empty() {
        return Err(LoaderError::query("", "query is empty"));
    }

    let kind = first_keyword(sql);
    let wrapped = matches!(kind.as_str(), "select" | "with");
    let exec_sql = if wrapped {
        // One extra row tells us whether the limit truncated the result.
        format!(
            "SELECT * FROM ({}) AS _q LIMIT {}",
            sql,
            max_rows.saturating_add(1)
        )
    } else {
        sql.to_string()
    };

    debug!(sql = %exec_sql, "Executing statement");

    let (columns, rows, truncated) = db.with_connection(|conn| {
        let mut stmt = conn
            .prepare(&exec_sql)
            .map_err(|e| LoaderError::query(sql, e.to_string()))?;
        let mut result_rows = stmt
            .query(params![])
            .map_err(|e| LoaderError::query(sql, e.to_string()))?;

        let mut rows = Vec::new();
        let mut truncated = false;
        while let Some(row) = result_rows
            .next()
            .map_err(|e| LoaderError::query(sql, e.to_string()))?
        {
            if rows.len() == max_rows {
                truncated = true;
                break;
            }
            let mut values = Vec::new();
            for i in 0.. {
                match row.get_ref(i) {
                    Ok(value) => values.push(value_to_json(value)),
                    Err(_) => break,
                }
            }
            rows.push(values);
        }

        // Rows borrows the statement; column metadata is readable once it
        // is released.
        drop(result_rows);
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

        Ok((columns, rows, truncated))
    })?;

    let elapsed_ms = start.elapsed().as_millis() as u64;

    if !wrapped && is_status_only(&columns) {
        info!(kind = %kind, elapsed_ms, "Statement executed");
        return Ok(QueryResult {
            message: Some("Query executed".to_string()),
            elapsed_ms,
            ..Default::default()
        });
    }

    info!(
        kind = %kind,
        rows = rows.len(),
        truncated,
        elapsed_ms,
        "Query executed"
    );

    Ok(QueryResult {
        columns,
        row_count: rows.len(),
        rows,
        truncated,
        message: None,
        elapsed_ms,
    })
}

/// Trims whitespace and trailing semicolons.
fn normalize_sql(sql: &str) -> &str {
    sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

/// The statement's first keyword, lowercased (`""` for empty input).
fn first_keyword(sql: &str) -> String {
    sql.split(|c: char| c.is_whitespace() || c == '(')
        .find(|t| !t.is_empty())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// DDL and DML report a single `Count` or `Success` status column instead of
/// a result set.
fn is_status_only(columns: &[String]) -> bool {
    match columns {
        [] => true,
        [only] => only == "Count" || only == "Success",
        _ => false,
    }
}

/// Convert a DuckDB `ValueRef` to JSON. Strings and blobs are read in place;
/// everything else goes through the owned [`Value`], which also resolves
/// enum dictionaries and nested lists, structs, and maps.
fn value_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Text(s) => JsonValue::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
        other => owned_to_json(Value::from(other)),
    }
}

fn owned_to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => JsonValue::Number(i.into()),
        Value::SmallInt(i) => JsonValue::Number(i.into()),
        Value::Int(i) => JsonValue::Number(i.into()),
        Value::BigInt(i) => JsonValue::Number(i.into()),
        Value::HugeInt(i) => match i64::try_from(i) {
            Ok(n) => JsonValue::Number(n.into()),
            Err(_) => JsonValue::String(i.to_string()),
        },
        Value::UTinyInt(i) => JsonValue::Number(i.into()),
        Value::USmallInt(i) => JsonValue::Number(i.into()),
        Value::UInt(i) => JsonValue::Number(i.into()),
        Value::UBigInt(i) => JsonValue::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f as f64)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Double(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Decimal(d) => JsonValue::String(d.to_string()),
        Value::Text(s) => JsonValue::String(s),
        Value::Blob(b) => JsonValue::String(base64::engine::general_purpose::STANDARD.encode(b)),
        Value::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days as i64)))
            .map(|d| JsonValue::String(d.to_string()))
            .unwrap_or(JsonValue::Null),
        Value::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|dt| JsonValue::String(dt.naive_utc().to_string()))
            .unwrap_or(JsonValue::Null),
        Value::Time64(unit, v) => {
            let micros = to_micros(unit, v);
            u32::try_from(micros.div_euclid(1_000_000))
                .ok()
                .and_then(|secs| {
                    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
                    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                })
                .map(|t| JsonValue::String(t.to_string()))
                .unwrap_or(JsonValue::Null)
        }
        Value::Interval {
            months,
            days,
            nanos,
        } => JsonValue::String(format_interval(months, days, nanos)),
        Value::Enum(s) => JsonValue::String(s),
        Value::List(items) | Value::Array(items) => {
            JsonValue::Array(items.into_iter().map(owned_to_json).collect())
        }
        Value::Struct(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), owned_to_json(v.clone())))
                .collect(),
        ),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| (map_key(k.clone()), owned_to_json(v.clone())))
                .collect(),
        ),
        Value::Union(inner) => owned_to_json(*inner),
        #[allow(unreachable_patterns)]
        other => JsonValue::String(format!("{:?}", other)),
    }
}

fn to_micros(unit: TimeUnit, v: i64) -> i64 {
    match unit {
        TimeUnit::Second => v.saturating_mul(1_000_000),
        TimeUnit::Millisecond => v.saturating_mul(1_000),
        TimeUnit::Microsecond => v,
        TimeUnit::Nanosecond => v / 1_000,
    }
}

/// JSON object keys must be strings; text keys are used as-is.
fn map_key(key: Value) -> String {
    match owned_to_json(key) {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

/// Renders an interval the way DuckDB prints it, e.g. `1 month 2 days 01:30:00`.
fn format_interval(months: i32, days: i32, nanos: i64) -> String {
    let plural = |n: i64, unit: &str| {
        if n.abs() == 1 {
            format!("{} {}", n, unit)
        } else {
            format!("{} {}s", n, unit)
        }
    };

    let mut parts = Vec::new();
    let (years, months) = (months / 12, months % 12);
    if years != 0 {
        parts.push(plural(years as i64, "year"));
    }
    if months != 0 {
        parts.push(plural(months as i64, "month"));
    }
    if days != 0 {
        parts.push(plural(days as i64, "day"));
    }
    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let micros = (nanos / 1_000).unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let mut clock = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            clock.push_str(&format!(".{:06}", frac));
        }
        parts.push(clock);
    }
    parts.join(" ")
}
