use super::reconcile::Reconciled;
use crate::services::sql::validate::source_database_path;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{info, warn};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("could not open report data: {0}")]
    Open(#[source] rusqlite::Error),
    #[error("query rejected: {0}")]
    Prepare(#[source] rusqlite::Error),
    #[error("query rejected: report scripts must not modify data")]
    NotReadOnly,
    #[error("reading rows failed: {0}")]
    Rows(#[source] rusqlite::Error),
}

/// Column names and cell values returned by a report query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// The caller's script, or the sample query when the script is blank.
pub fn effective_script<'a>(script: &'a str, sample_query: &'a str) -> &'a str {
    if script.trim().is_empty() {
        sample_query
    } else {
        script
    }
}

/// Read-only connection report scripts run on.
///
/// The catalog is `main`, so the sample query sees `dev_logs`. Every database
/// listed in `source_databases` is attached under its own name, which lets a
/// query accepted by `validate-sql-query` run unqualified. Attached files inherit
/// the read-only flag; entries without a usable file are skipped.
pub fn open_report_source(catalog_path: &Path, databases_dir: &Path) -> Result<Connection, QueryError> {
    let conn = Connection::open_with_flags(
        catalog_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(QueryError::Open)?;

    let names: Vec<String> = {
        let mut stmt = conn
            .prepare("SELECT database_name FROM source_databases ORDER BY database_name")
            .map_err(QueryError::Open)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(QueryError::Open)?;
        rows.collect::<rusqlite::Result<_>>().map_err(QueryError::Open)?
    };

    for name in names {
        let path = match source_database_path(databases_dir, &name) {
            Ok(path) => path,
            Err(e) => {
                warn!("Skipping source database: {}", e);
                continue;
            }
        };
        // The name passed the identifier check, so quoting it is enough.
        let attach = format!("ATTACH DATABASE ?1 AS \"{}\"", name);
        match conn.execute(&attach, params![path.to_string_lossy().into_owned()]) {
            Ok(_) => info!("Attached source database {}", name),
            Err(e) => warn!("Skipping source database {}: {}", name, e),
        }
    }

    Ok(conn)
}

pub fn run_query(conn: &Connection, script: &str) -> Result<QueryResult, QueryError> {
    let mut stmt = conn.prepare(script).map_err(QueryError::Prepare)?;
    if !stmt.readonly() {
        return Err(QueryError::NotReadOnly);
    }
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(cell_value))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })
        .map_err(QueryError::Rows)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(QueryError::Rows)?;

    Ok(QueryResult { columns, rows })
}

/// Converts one SQL value into a spreadsheet cell.
pub fn cell_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(BASE64.encode(b)),
    }
}

/// Header row followed by one row per query row.
///
/// Extra columns are filled with empty strings; `trailing` cells are appended
/// after them on every data row.
pub fn sheet_rows(reconciled: &Reconciled, data: &[Vec<Value>], trailing: &[Value]) -> Vec<Vec<Value>> {
    let mut rows = Vec::with_capacity(data.len() + 1);
    rows.push(
        reconciled
            .all_columns
            .iter()
            .map(|name| Value::String(name.clone()))
            .collect(),
    );

    for record in data {
        let mut row = Vec::with_capacity(reconciled.all_columns.len() + trailing.len());
        row.extend(
            reconciled
                .result_positions
                .iter()
                .map(|&i| record.get(i).cloned().unwrap_or(Value::Null)),
        );
        row.extend(reconciled.extra_columns.iter().map(|_| Value::String(String::new())));
        row.extend(trailing.iter().cloned());
        rows.push(row);
    }

    rows
}
