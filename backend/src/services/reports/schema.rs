use super::permissions::PermissionError;
use chrono::{DateTime, Utc};
use common::model::report::Column;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

/// Declared column name to declared type.
pub fn snapshot(columns: &[Column]) -> BTreeMap<&str, &str> {
    columns
        .iter()
        .map(|c| (c.name.as_str(), c.data_type.as_str()))
        .collect()
}

pub fn persist(
    conn: &Connection,
    report_id: &str,
    report_name: &str,
    columns: &[Column],
    created_at: DateTime<Utc>,
) -> Result<(), PermissionError> {
    let schema = serde_json::to_string(&snapshot(columns))?;
    conn.execute(
        "INSERT INTO spreadsheet (id, report_name, created_at, schema) VALUES (?1, ?2, ?3, ?4)",
        params![report_id, report_name, created_at.to_rfc3339(), schema],
    )?;
    Ok(())
}
