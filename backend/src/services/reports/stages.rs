//! Staged report layout.
//!
//! A staged report has one tab per stage. Every tab carries the report columns
//! followed by the transition columns for its position in the workflow; rows
//! move between tabs when a transition cell is ticked.

use super::permissions::{grant, PermissionError, PermissionIndex};
use chrono::{DateTime, Utc};
use common::model::report::StageInput;
use rusqlite::{params, Connection};
use serde_json::Value;
use uuid::Uuid;

pub const MOVE_BACK: &str = "Move Back";
pub const MOVE_FORWARD: &str = "Move Forward";
pub const COMPLETE: &str = "Complete";
pub const TRANSITION_COLUMNS: [&str; 3] = [MOVE_BACK, MOVE_FORWARD, COMPLETE];

/// Transition columns for the stage at `position` out of `count`.
pub fn transition_columns(position: usize, count: usize) -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(2);
    if position > 0 {
        columns.push(MOVE_BACK);
    }
    if position + 1 < count {
        columns.push(MOVE_FORWARD);
    } else {
        columns.push(COMPLETE);
    }
    columns
}

pub fn stage_header(all_columns: &[String], position: usize, count: usize) -> Vec<Value> {
    all_columns
        .iter()
        .map(|name| Value::String(name.clone()))
        .chain(
            transition_columns(position, count)
                .into_iter()
                .map(|name| Value::String(name.to_string())),
        )
        .collect()
}

/// Every role of every stage may edit every report column.
pub fn build_stage_index(stages: &[StageInput], all_columns: &[String]) -> PermissionIndex {
    let mut index = PermissionIndex::new();
    for stage in stages {
        for role in &stage.roles {
            for column in all_columns {
                grant(&mut index, role, column);
            }
        }
    }
    index
}

pub fn persist(
    conn: &Connection,
    report_id: &str,
    stages: &[StageInput],
    now: DateTime<Utc>,
) -> Result<usize, PermissionError> {
    let mut stmt = conn.prepare(
        "INSERT INTO stages (id, spreadsheet_id, position, name, description, roles, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
    )?;
    let timestamp = now.to_rfc3339();

    for (position, stage) in stages.iter().enumerate() {
        let roles = serde_json::to_string(&stage.roles)?;
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            report_id,
            position as i64,
            stage.name,
            stage.description,
            roles,
            timestamp,
        ])?;
    }
    Ok(stages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{add_report, catalog};

    fn stage(name: &str, roles: &[&str]) -> StageInput {
        StageInput {
            name: name.to_string(),
            description: format!("{} stage", name),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn transitions_depend_on_position() {
        assert_eq!(transition_columns(0, 3), vec![MOVE_FORWARD]);
        assert_eq!(transition_columns(1, 3), vec![MOVE_BACK, MOVE_FORWARD]);
        assert_eq!(transition_columns(2, 3), vec![MOVE_BACK, COMPLETE]);
        assert_eq!(transition_columns(0, 1), vec![COMPLETE]);
    }

    #[test]
    fn header_appends_transitions() {
        let header = stage_header(&["id".to_string(), "amount".to_string()], 1, 2);
        assert_eq!(header, vec!["id", "amount", "Move Back", "Complete"]);
    }

    #[test]
    fn role_in_several_stages_is_indexed_once() {
        let columns = vec!["id".to_string(), "amount".to_string()];
        let index = build_stage_index(&[stage("Draft", &["A"]), stage("Review", &["A", "B"])], &columns);

        assert_eq!(index.len(), 2);
        assert_eq!(index["A"], columns);
        assert_eq!(index["B"], columns);
    }

    #[test]
    fn stages_are_stored_with_positions() {
        let conn = catalog();
        add_report(&conn, "doc-1", "Expenses");
        let now = Utc::now();

        let written = persist(&conn, "doc-1", &[stage("Draft", &["A"]), stage("Review", &["B"])], now).unwrap();
        assert_eq!(written, 2);

        let (name, roles): (String, String) = conn
            .query_row(
                "SELECT name, roles FROM stages WHERE spreadsheet_id = 'doc-1' AND position = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Review");
        assert_eq!(roles, r#"["B"]"#);
    }
}
