use serde::{Deserialize, Serialize};

/// A column the caller declares for a new report.
///
/// Declared columns that the report query does not return are appended to the
/// sheet as empty columns. `writable_by` lists the role ids allowed to edit the
/// column once the sheet is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Free-form data type label, stored verbatim in the report schema snapshot.
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(rename = "writableBy", default)]
    pub writable_by: Vec<String>,
}

/// One phase of a staged report. Each stage becomes its own tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Request payload for `POST /api/v1/create-report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportInput {
    pub report_name: String,
    /// Query whose result fills the sheet. Blank means "use the sample query".
    #[serde(default)]
    pub sql_script: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Vec<StageInput>>,
}

impl ReportInput {
    /// Stages of a staged report, or `None` for a plain single-sheet report.
    pub fn staged(&self) -> Option<&[StageInput]> {
        match &self.stages {
            Some(stages) if !stages.is_empty() => Some(stages),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_report_payload() {
        let body = r#"{
            "reportName": "Sales",
            "sqlScript": "SELECT id, revenue FROM sales_fact",
            "columns": [{"name": "revenue", "type": "numeric", "writableBy": ["role-A"]}]
        }"#;
        let input: ReportInput = serde_json::from_str(body).unwrap();
        assert_eq!(input.report_name, "Sales");
        assert_eq!(input.columns[0].data_type, "numeric");
        assert_eq!(input.columns[0].writable_by, vec!["role-A".to_string()]);
        assert!(input.staged().is_none());
    }

    #[test]
    fn empty_stage_list_is_not_staged() {
        let body = r#"{"reportName": "Ops", "stages": []}"#;
        let input: ReportInput = serde_json::from_str(body).unwrap();
        assert!(input.sql_script.is_empty());
        assert!(input.staged().is_none());
    }
}
