//! # Report Provisioning
//!
//! Turns a [`ReportInput`] into a live spreadsheet plus its catalog records.
//!
//! ## Workflow
//!
//! 1. **Create**: an empty document titled after the report, with the edit
//!    guard bound when one is configured.
//! 2. **Query**: the report script runs on a read-only connection that sees
//!    the catalog and every registered source database. Statements that write
//!    are rejected. A blank script runs the configured sample query instead.
//! 3. **Reconcile**: query columns and declared columns are merged.
//! 4. **Write**: header and data land at `A1` of the first tab. Staged reports
//!    get one tab per stage, with only the first stage holding data.
//! 5. **Format**: header protection, bold header and wrapped cells. Failures
//!    here are logged and otherwise ignored.
//! 6. **Persist**: schema snapshot, permission rows and stages, all in one
//!    transaction.
//!
//! Once the document exists, a failed step deletes it again unless
//! `rollback_on_failure` is turned off.

use super::data::{effective_script, run_query, sheet_rows, QueryError};
use super::permissions::{self, build_index, PermissionError, PermissionIndex};
use super::reconcile::{reconcile, Reconciled};
use super::{schema, stages};
use crate::config::ProvisioningConfig;
use crate::sheets::{DocumentProvider, FormatRequest, GridRange, ProviderError};
use chrono::Utc;
use common::model::report::{ReportInput, StageInput};
use log::{error, info, warn};
use rusqlite::Connection;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const HEADER_PROTECTION: &str = "Report header";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Could not open report store: {0}")]
    Store(#[source] rusqlite::Error),
    #[error("Could not create spreadsheet, please try again: {0}")]
    CreateDocument(#[source] ProviderError),
    #[error("Failed to prepare data for sheet: {0}")]
    PrepareData(#[source] QueryError),
    #[error("Failed to write data to sheet: {0}")]
    WriteData(#[source] ProviderError),
    #[error("Failed to persist report schema: {0}")]
    PersistSchema(#[source] PermissionError),
    #[error("Failed to persist report permissions: {0}")]
    PersistPermissions(#[source] PermissionError),
    #[error("Failed to persist report stages: {0}")]
    PersistStages(#[source] PermissionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Start,
    DocumentCreated,
    DataQueried,
    DataWritten,
    Formatted,
    SchemaPersisted,
    PermissionsPersisted,
    StagesPersisted,
    Done,
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionState::Start => "start",
            ProvisionState::DocumentCreated => "document created",
            ProvisionState::DataQueried => "data queried",
            ProvisionState::DataWritten => "data written",
            ProvisionState::Formatted => "formatted",
            ProvisionState::SchemaPersisted => "schema persisted",
            ProvisionState::PermissionsPersisted => "permissions persisted",
            ProvisionState::StagesPersisted => "stages persisted",
            ProvisionState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedReport {
    pub document_id: String,
    pub url: String,
    pub all_columns: Vec<String>,
    pub permissions: PermissionIndex,
}

enum Compensation {
    DeleteDocument(String),
}

/// Undo actions for external side effects, run newest first.
struct Compensations<'p, P: DocumentProvider> {
    provider: &'p P,
    enabled: bool,
    pending: Vec<Compensation>,
}

impl<'p, P: DocumentProvider> Compensations<'p, P> {
    fn new(provider: &'p P, enabled: bool) -> Self {
        Self { provider, enabled, pending: Vec::new() }
    }

    fn record(&mut self, compensation: Compensation) {
        self.pending.push(compensation);
    }

    fn unwind(self) {
        if !self.enabled {
            if !self.pending.is_empty() {
                warn!("Rollback disabled, leaving {} external change(s) in place", self.pending.len());
            }
            return;
        }
        for compensation in self.pending.into_iter().rev() {
            match compensation {
                Compensation::DeleteDocument(document_id) => {
                    match self.provider.delete_document(&document_id) {
                        Ok(()) => info!("Deleted spreadsheet {} after failed creation", document_id),
                        Err(e) => warn!("Could not delete spreadsheet {}: {}", document_id, e),
                    }
                }
            }
        }
    }
}

/// Sheet written in step 4, kept for the formatting pass.
struct WrittenSheet {
    title: String,
    columns: u32,
    rows: u32,
    /// Leading columns that carry report data, as opposed to transition columns.
    data_columns: u32,
}

pub struct ReportProvisioner<'a, P: DocumentProvider> {
    conn: &'a mut Connection,
    /// Read-only connection the report script runs on.
    source: &'a Connection,
    provider: &'a P,
    options: &'a ProvisioningConfig,
    state: ProvisionState,
}

impl<'a, P: DocumentProvider> ReportProvisioner<'a, P> {
    pub fn new(
        conn: &'a mut Connection,
        source: &'a Connection,
        provider: &'a P,
        options: &'a ProvisioningConfig,
    ) -> Self {
        Self { conn, source, provider, options, state: ProvisionState::Start }
    }

    pub fn provision(&mut self, input: &ReportInput) -> Result<ProvisionedReport, ProvisionError> {
        let mut compensations = Compensations::new(self.provider, self.options.rollback_on_failure);
        match self.run(input, &mut compensations) {
            Ok(report) => {
                self.advance(ProvisionState::Done);
                Ok(report)
            }
            Err(e) => {
                error!("Report '{}' failed after step '{}': {}", input.report_name, self.state, e);
                compensations.unwind();
                Err(e)
            }
        }
    }

    fn advance(&mut self, next: ProvisionState) {
        info!("Report provisioning: {} -> {}", self.state, next);
        self.state = next;
    }

    fn run(
        &mut self,
        input: &ReportInput,
        compensations: &mut Compensations<'a, P>,
    ) -> Result<ProvisionedReport, ProvisionError> {
        let document_id = self
            .provider
            .create_document(&input.report_name)
            .map_err(ProvisionError::CreateDocument)?;
        compensations.record(Compensation::DeleteDocument(document_id.clone()));
        let open_columns: &[&str] = match input.staged() {
            Some(_) => &stages::TRANSITION_COLUMNS,
            None => &[],
        };
        self.provider
            .attach_edit_guard(&document_id, open_columns)
            .map_err(ProvisionError::CreateDocument)?;
        self.advance(ProvisionState::DocumentCreated);

        let script = effective_script(&input.sql_script, &self.options.sample_query);
        let result = run_query(self.source, script).map_err(ProvisionError::PrepareData)?;
        self.advance(ProvisionState::DataQueried);

        let reconciled = reconcile(&result.columns, &input.columns);
        let written = match input.staged() {
            Some(stage_list) => self.write_staged(&document_id, stage_list, &reconciled, &result.rows),
            None => self.write_single(&document_id, &reconciled, &result.rows),
        }
        .map_err(ProvisionError::WriteData)?;
        self.advance(ProvisionState::DataWritten);

        self.format_sheets(&document_id, &written);
        self.advance(ProvisionState::Formatted);

        let permissions = self.persist(&document_id, input, &reconciled)?;

        Ok(ProvisionedReport {
            url: format!("{}{}", self.options.document_url_prefix, document_id),
            document_id,
            all_columns: reconciled.all_columns,
            permissions,
        })
    }

    fn write_single(
        &self,
        document_id: &str,
        reconciled: &Reconciled,
        data: &[Vec<Value>],
    ) -> Result<Vec<WrittenSheet>, ProviderError> {
        let (title, _) = self.provider.first_sheet(document_id)?;
        let rows = sheet_rows(reconciled, data, &[]);
        self.provider.write_range(document_id, &title, "A1", &rows)?;
        let width = reconciled.all_columns.len() as u32;
        Ok(vec![WrittenSheet {
            title,
            columns: width,
            rows: rows.len() as u32,
            data_columns: width,
        }])
    }

    fn write_staged(
        &self,
        document_id: &str,
        stage_list: &[StageInput],
        reconciled: &Reconciled,
        data: &[Vec<Value>],
    ) -> Result<Vec<WrittenSheet>, ProviderError> {
        let (_, first_sheet) = self.provider.first_sheet(document_id)?;
        let count = stage_list.len();
        let mut written = Vec::with_capacity(count);

        for (position, stage) in stage_list.iter().enumerate() {
            if position == 0 {
                self.provider.rename_sheet(document_id, first_sheet, &stage.name)?;
            } else {
                self.provider.add_sheet(document_id, &stage.name)?;
            }

            let header = stages::stage_header(&reconciled.all_columns, position, count);
            let transitions = header.len() - reconciled.all_columns.len();
            let rows = if position == 0 {
                let mut rows = sheet_rows(reconciled, data, &vec![Value::Bool(false); transitions]);
                rows[0] = header;
                rows
            } else {
                vec![header]
            };

            self.provider.write_range(document_id, &stage.name, "A1", &rows)?;
            written.push(WrittenSheet {
                title: stage.name.clone(),
                columns: rows[0].len() as u32,
                rows: rows.len() as u32,
                data_columns: reconciled.all_columns.len() as u32,
            });
        }
        Ok(written)
    }

    fn format_sheets(&self, document_id: &str, written: &[WrittenSheet]) {
        let sheet_ids = match self.provider.sheet_ids(document_id) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Skipping formatting of {}: {}", document_id, e);
                return;
            }
        };

        for sheet in written {
            let Some(&sheet_id) = sheet_ids.get(&sheet.title) else {
                warn!("Skipping formatting of missing sheet '{}'", sheet.title);
                continue;
            };
            if let Err(e) = self.provider.format(document_id, sheet_id, &format_requests(sheet)) {
                warn!("Formatting sheet '{}' failed: {}", sheet.title, e);
            }
        }
    }

    fn persist(
        &mut self,
        document_id: &str,
        input: &ReportInput,
        reconciled: &Reconciled,
    ) -> Result<PermissionIndex, ProvisionError> {
        let now = Utc::now();
        let tx = self
            .conn
            .transaction()
            .map_err(|e| ProvisionError::PersistSchema(e.into()))?;

        schema::persist(&tx, document_id, &input.report_name, &input.columns, now)
            .map_err(ProvisionError::PersistSchema)?;
        info!("Report provisioning: {} -> {}", self.state, ProvisionState::SchemaPersisted);
        self.state = ProvisionState::SchemaPersisted;

        let index = match input.staged() {
            Some(stage_list) => stages::build_stage_index(stage_list, &reconciled.all_columns),
            None => build_index(&input.columns),
        };
        let granted = permissions::persist(&tx, document_id, &index)
            .map_err(ProvisionError::PersistPermissions)?;
        info!("Stored {} permission record(s) for {}", granted, document_id);
        info!("Report provisioning: {} -> {}", self.state, ProvisionState::PermissionsPersisted);
        self.state = ProvisionState::PermissionsPersisted;

        if let Some(stage_list) = input.staged() {
            stages::persist(&tx, document_id, stage_list, now).map_err(ProvisionError::PersistStages)?;
            info!("Report provisioning: {} -> {}", self.state, ProvisionState::StagesPersisted);
            self.state = ProvisionState::StagesPersisted;
        }

        tx.commit().map_err(|e| commit_failure(input, e))?;
        Ok(index)
    }
}

/// Commit errors are reported against the last step the transaction covered.
fn commit_failure(input: &ReportInput, e: rusqlite::Error) -> ProvisionError {
    match input.staged() {
        Some(_) => ProvisionError::PersistStages(e.into()),
        None => ProvisionError::PersistPermissions(e.into()),
    }
}

fn format_requests(sheet: &WrittenSheet) -> Vec<FormatRequest> {
    let header = GridRange { start_row: 0, end_row: 1, start_column: 0, end_column: None };
    vec![
        FormatRequest::Protect {
            range: GridRange { end_column: Some(sheet.data_columns), ..header },
            description: HEADER_PROTECTION.to_string(),
        },
        FormatRequest::Bold(GridRange { end_column: Some(sheet.columns), ..header }),
        FormatRequest::Wrap(GridRange {
            start_row: 0,
            end_row: sheet.rows,
            start_column: 0,
            end_column: Some(sheet.columns),
        }),
    ]
}
