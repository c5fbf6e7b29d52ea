//! # Query Validation
//!
//! Backs `POST /api/v1/validate-sql-query`. The report builder sends a draft
//! query and the source database it targets; the response describes the
//! result shape (column names and declared types) and how many rows the query
//! would return.
//!
//! ## Workflow
//!
//! 1. **Scope switch**: the source database `<databases_dir>/<db_name>.sqlite` is
//!    opened read-only. Unknown names never create a file.
//! 2. **Normalization**: surrounding whitespace and one trailing `;` are removed.
//!    A second terminator is an invalid query.
//! 3. **Syntax check**: the statement is prepared but not run.
//! 4. **Shape check**: the query is wrapped in `LIMIT 0` and stepped once, so no
//!    row is materialized.
//! 5. **Row count**: the query is wrapped in `SELECT COUNT(*)`. This runs the full
//!    query, so validation costs about as much as the query itself.

use crate::config::AppConfig;
use crate::services::error_body;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use common::model::introspection::{ColumnInfo, SqlValidationResponse};
use common::requests::SqlValidationRequest;
use log::{error, info};
use regex::Regex;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("failed to switch database: {0}")]
    UnknownDatabase(String),
    #[error("invalid SQL query: {0}")]
    InvalidQuery(String),
    #[error("error executing query: {0}")]
    Execution(#[source] rusqlite::Error),
    #[error("error getting row count: {0}")]
    RowCount(#[source] rusqlite::Error),
}

impl IntrospectError {
    fn status(&self) -> StatusCode {
        match self {
            IntrospectError::UnknownDatabase(_) | IntrospectError::InvalidQuery(_) => {
                StatusCode::BAD_REQUEST
            }
            IntrospectError::Execution(_) | IntrospectError::RowCount(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub(crate) async fn process(
    config: web::Data<AppConfig>,
    payload: web::Json<SqlValidationRequest>,
) -> impl Responder {
    let req = payload.into_inner();
    let result = tokio::task::spawn_blocking(move || -> Result<_, IntrospectError> {
        let conn = open_source_database(&config.databases_dir, &req.db_name)?;
        introspect(&conn, &req.query)
    })
    .await;

    match result {
        Ok(Ok(response)) => HttpResponse::Ok().json(response),
        Ok(Err(e)) => {
            error!("Query validation failed: {}", e);
            error_body(e.status(), e.to_string())
        }
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, format!("Task join error: {}", e)),
    }
}

/// Path of a source database, refusing names that are not plain identifiers.
pub fn source_database_path(databases_dir: &Path, db_name: &str) -> Result<PathBuf, IntrospectError> {
    let name_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| IntrospectError::UnknownDatabase(format!("Regex error: {}", e)))?;
    if !name_re.is_match(db_name) {
        return Err(IntrospectError::UnknownDatabase(format!(
            "'{}' is not a valid database name",
            db_name
        )));
    }
    Ok(databases_dir.join(format!("{}.sqlite", db_name)))
}

/// Opens one source database read-only. Unknown names never create a file.
pub fn open_source_database(databases_dir: &Path, db_name: &str) -> Result<Connection, IntrospectError> {
    let path = source_database_path(databases_dir, db_name)?;
    Connection::open_with_flags(
        &path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| IntrospectError::UnknownDatabase(format!("{}: {}", db_name, e)))
}

/// Trims whitespace and at most one trailing statement terminator.
pub fn normalize_query(query: &str) -> &str {
    let query = query.trim();
    query.strip_suffix(';').unwrap_or(query).trim_end()
}

/// Line breaks around the user query keep a trailing `--` comment from
/// swallowing the closing parenthesis.
fn wrap_query(prefix: &str, query: &str, suffix: &str) -> String {
    format!("{}\n{}\n{}", prefix, query, suffix)
}

pub fn introspect(conn: &Connection, query: &str) -> Result<SqlValidationResponse, IntrospectError> {
    let query = normalize_query(query);
    if query.is_empty() {
        return Err(IntrospectError::InvalidQuery("query is empty".to_string()));
    }
    if query.ends_with(';') {
        return Err(IntrospectError::InvalidQuery("expected a single statement".to_string()));
    }

    // Preparing compiles the statement without stepping it.
    conn.prepare(query)
        .map_err(|e| IntrospectError::InvalidQuery(e.to_string()))?;

    let mut shape = conn
        .prepare(&wrap_query("SELECT * FROM (", query, ") LIMIT 0"))
        .map_err(IntrospectError::Execution)?;
    let columns: Vec<ColumnInfo> = shape
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            col_name: c.name().to_string(),
            data_type: c.decl_type().map(str::to_uppercase).unwrap_or_default(),
        })
        .collect();
    {
        let mut rows = shape.query([]).map_err(IntrospectError::Execution)?;
        rows.next().map_err(IntrospectError::Execution)?;
    }

    let count: i64 = conn
        .query_row(&wrap_query("SELECT COUNT(*) FROM (", query, ") AS sub"), [], |row| row.get(0))
        .map_err(IntrospectError::RowCount)?;

    info!("Validated query returning {} columns over {} rows", columns.len(), count);
    Ok(SqlValidationResponse { columns, count })
}
