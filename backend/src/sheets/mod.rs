//! External spreadsheet capability.
//!
//! Report provisioning only needs a handful of operations from the document
//! provider: create and delete a document, inspect and manage its tabs, write
//! a block of cells and apply formatting. `DocumentProvider` captures exactly
//! that, so the pipeline can run against Google Sheets in production and a
//! recording fake in tests.

mod credentials;
mod google;
#[cfg(test)]
pub(crate) mod testing;

pub use google::GoogleSheets;

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    #[error("request to document provider failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("document provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("document {0} has no sheets")]
    NoSheets(String),
    #[error("unexpected provider response: {0}")]
    Malformed(String),
}

/// Zero-based, end-exclusive cell rectangle on one sheet.
/// `end_column: None` leaves the range open to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_column: u32,
    pub end_column: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatRequest {
    /// Only the document owner may edit the range.
    Protect { range: GridRange, description: String },
    Bold(GridRange),
    Wrap(GridRange),
}

pub trait DocumentProvider {
    /// Creates an empty spreadsheet and returns its provider id.
    fn create_document(&self, title: &str) -> Result<String, ProviderError>;

    fn delete_document(&self, document_id: &str) -> Result<(), ProviderError>;

    /// Tab title to internal sheet id.
    fn sheet_ids(&self, document_id: &str) -> Result<HashMap<String, i64>, ProviderError>;

    fn add_sheet(&self, document_id: &str, title: &str) -> Result<(), ProviderError>;

    fn rename_sheet(&self, document_id: &str, sheet_id: i64, title: &str)
        -> Result<(), ProviderError>;

    /// Writes `rows` starting at `start_cell` (A1 notation) of the named tab.
    fn write_range(
        &self,
        document_id: &str,
        sheet: &str,
        start_cell: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), ProviderError>;

    fn format(
        &self,
        document_id: &str,
        sheet_id: i64,
        requests: &[FormatRequest],
    ) -> Result<(), ProviderError>;

    /// Binds the column edit guard to the document. No-op when not configured.
    /// Edits under an `open_columns` header are never checked.
    fn attach_edit_guard(&self, document_id: &str, open_columns: &[&str]) -> Result<(), ProviderError>;

    /// Title and id of the tab a new document starts with. Its title depends on
    /// the account locale, so it is found by the lowest sheet id.
    fn first_sheet(&self, document_id: &str) -> Result<(String, i64), ProviderError> {
        self.sheet_ids(document_id)?
            .into_iter()
            .min_by_key(|(_, id)| *id)
            .ok_or_else(|| ProviderError::NoSheets(document_id.to_string()))
    }
}
