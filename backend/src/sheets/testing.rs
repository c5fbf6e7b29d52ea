//! Recording fake of the document provider.

use super::{DocumentProvider, FormatRequest, ProviderError};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;

pub const DOCUMENT_ID: &str = "doc-1";

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateDocument(String),
    DeleteDocument(String),
    AddSheet(String),
    RenameSheet(i64, String),
    Write { sheet: String, start_cell: String, rows: Vec<Vec<Value>> },
    Format { sheet_id: i64, requests: Vec<FormatRequest> },
    AttachEditGuard { document_id: String, open_columns: Vec<String> },
}

/// Records every call. `fail_on` names one operation that returns an API error.
pub struct RecordingProvider {
    pub calls: RefCell<Vec<Call>>,
    fail_on: Option<&'static str>,
    sheets: RefCell<Vec<(String, i64)>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: None,
            sheets: RefCell::new(vec![("Sheet1".to_string(), 0)]),
        }
    }

    pub fn failing_on(operation: &'static str) -> Self {
        Self { fail_on: Some(operation), ..Self::new() }
    }

    /// New documents start with a tab named `title` instead of `Sheet1`.
    pub fn with_first_sheet(title: &str) -> Self {
        Self { sheets: RefCell::new(vec![(title.to_string(), 0)]), ..Self::new() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(String, Vec<Vec<Value>>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Write { sheet, rows, .. } => Some((sheet, rows)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, operation: &'static str, call: Call) -> Result<(), ProviderError> {
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(operation) {
            return Err(ProviderError::Api { status: 500, body: format!("{} failed", operation) });
        }
        Ok(())
    }
}

impl DocumentProvider for RecordingProvider {
    fn create_document(&self, title: &str) -> Result<String, ProviderError> {
        self.record("create_document", Call::CreateDocument(title.to_string()))?;
        Ok(DOCUMENT_ID.to_string())
    }

    fn delete_document(&self, document_id: &str) -> Result<(), ProviderError> {
        self.record("delete_document", Call::DeleteDocument(document_id.to_string()))
    }

    fn sheet_ids(&self, _document_id: &str) -> Result<HashMap<String, i64>, ProviderError> {
        Ok(self.sheets.borrow().iter().cloned().collect())
    }

    fn add_sheet(&self, _document_id: &str, title: &str) -> Result<(), ProviderError> {
        self.record("add_sheet", Call::AddSheet(title.to_string()))?;
        let mut sheets = self.sheets.borrow_mut();
        let next = sheets.iter().map(|(_, id)| *id).max().unwrap_or(0) + 1;
        sheets.push((title.to_string(), next));
        Ok(())
    }

    fn rename_sheet(&self, _document_id: &str, sheet_id: i64, title: &str) -> Result<(), ProviderError> {
        self.record("rename_sheet", Call::RenameSheet(sheet_id, title.to_string()))?;
        for sheet in self.sheets.borrow_mut().iter_mut() {
            if sheet.1 == sheet_id {
                sheet.0 = title.to_string();
            }
        }
        Ok(())
    }

    fn write_range(
        &self,
        _document_id: &str,
        sheet: &str,
        start_cell: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), ProviderError> {
        self.record(
            "write_range",
            Call::Write {
                sheet: sheet.to_string(),
                start_cell: start_cell.to_string(),
                rows: rows.to_vec(),
            },
        )
    }

    fn format(
        &self,
        _document_id: &str,
        sheet_id: i64,
        requests: &[FormatRequest],
    ) -> Result<(), ProviderError> {
        self.record("format", Call::Format { sheet_id, requests: requests.to_vec() })
    }

    fn attach_edit_guard(&self, document_id: &str, open_columns: &[&str]) -> Result<(), ProviderError> {
        self.record(
            "attach_edit_guard",
            Call::AttachEditGuard {
                document_id: document_id.to_string(),
                open_columns: open_columns.iter().map(|c| c.to_string()).collect(),
            },
        )
    }
}
