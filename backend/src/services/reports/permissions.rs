use common::model::report::Column;
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Role id to the columns that role may edit, in first-seen order.
pub type PermissionIndex = BTreeMap<String, Vec<String>>;

#[derive(Debug, Error)]
pub enum PermissionError {
    #[error("{0}")]
    Store(#[from] rusqlite::Error),
    #[error("could not encode column list: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Inverts column -> writers into role -> columns.
pub fn build_index(columns: &[Column]) -> PermissionIndex {
    let mut index = PermissionIndex::new();
    for column in columns {
        for role in &column.writable_by {
            grant(&mut index, role, &column.name);
        }
    }
    index
}

pub(crate) fn grant(index: &mut PermissionIndex, role: &str, column: &str) {
    let granted = index.entry(role.to_string()).or_default();
    if !granted.iter().any(|c| c == column) {
        granted.push(column.to_string());
    }
}

/// Inserts one permission row per role and returns how many were written.
///
/// Rows are always inserted with a fresh id, so persisting the same report twice
/// leaves two rows per role.
pub fn persist(
    conn: &Connection,
    report_id: &str,
    index: &PermissionIndex,
) -> Result<usize, PermissionError> {
    let mut stmt = conn.prepare(
        "INSERT INTO spreadsheetpermissions (id, spreadsheet_id, role_id, columns_permissions) \
         VALUES (?1, ?2, ?3, ?4)",
    )?;

    let mut written = 0;
    for (role_id, columns) in index {
        let columns_json = serde_json::to_string(columns)?;
        stmt.execute(params![Uuid::new_v4().to_string(), report_id, role_id, columns_json])?;
        written += 1;
    }
    Ok(written)
}
