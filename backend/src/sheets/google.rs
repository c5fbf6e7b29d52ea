use super::credentials;
use super::{DocumentProvider, FormatRequest, GridRange, ProviderError};
use crate::config::SheetsConfig;
use log::info;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCRIPT_PROJECTS_URL: &str = "https://script.googleapis.com/v1/projects";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const EDIT_GUARD_TITLE: &str = "Column Edit Guard";
const EDIT_GUARD_SOURCE: &str = include_str!("edit_guard.js");
const EDIT_GUARD_MANIFEST: &str =
    r#"{"timeZone":"America/New_York","exceptionLogging":"CLOUD","runtimeVersion":"V8"}"#;

/// Google Drive + Sheets + Apps Script client.
///
/// Uses the blocking reqwest client; callers run it off the async executor.
pub struct GoogleSheets {
    http: Client,
    access_token: String,
    parent_folder_id: Option<String>,
    edit_guard_url: Option<String>,
}

#[derive(Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Deserialize)]
struct CreatedScript {
    #[serde(rename = "scriptId")]
    script_id: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    // The API omits a zero sheet id.
    #[serde(rename = "sheetId", default)]
    sheet_id: i64,
    title: String,
}

impl GoogleSheets {
    pub fn connect(config: &SheetsConfig) -> Result<Self, ProviderError> {
        let http = Client::new();
        let access_token =
            credentials::access_token(&http, &config.client_secret_path, &config.token_path)?;
        Ok(Self {
            http,
            access_token,
            parent_folder_id: config.parent_folder_id.clone(),
            edit_guard_url: config.edit_guard_url.clone(),
        })
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.bearer_auth(&self.access_token).send()?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ProviderError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            })
        }
    }

    fn batch_update(&self, document_id: &str, requests: Vec<Value>) -> Result<(), ProviderError> {
        let url = format!("{}/{}:batchUpdate", SHEETS_URL, document_id);
        self.send(self.http.post(url).json(&json!({ "requests": requests })))?;
        Ok(())
    }
}

impl DocumentProvider for GoogleSheets {
    fn create_document(&self, title: &str) -> Result<String, ProviderError> {
        let mut metadata = json!({ "name": title, "mimeType": SPREADSHEET_MIME });
        if let Some(folder) = &self.parent_folder_id {
            metadata["parents"] = json!([folder]);
        }
        let created: CreatedFile = self
            .send(self.http.post(DRIVE_FILES_URL).json(&metadata))?
            .json()?;
        info!("Spreadsheet created with id {}", created.id);
        Ok(created.id)
    }

    fn delete_document(&self, document_id: &str) -> Result<(), ProviderError> {
        self.send(self.http.delete(format!("{}/{}", DRIVE_FILES_URL, document_id)))?;
        Ok(())
    }

    fn sheet_ids(&self, document_id: &str) -> Result<HashMap<String, i64>, ProviderError> {
        let meta: SpreadsheetMeta = self
            .send(
                self.http
                    .get(format!("{}/{}", SHEETS_URL, document_id))
                    .query(&[("fields", "sheets.properties(sheetId,title)")]),
            )?
            .json()?;
        Ok(meta
            .sheets
            .into_iter()
            .map(|s| (s.properties.title, s.properties.sheet_id))
            .collect())
    }

    fn add_sheet(&self, document_id: &str, title: &str) -> Result<(), ProviderError> {
        self.batch_update(
            document_id,
            vec![json!({ "addSheet": { "properties": { "title": title } } })],
        )
    }

    fn rename_sheet(&self, document_id: &str, sheet_id: i64, title: &str) -> Result<(), ProviderError> {
        self.batch_update(
            document_id,
            vec![json!({
                "updateSheetProperties": {
                    "properties": { "sheetId": sheet_id, "title": title },
                    "fields": "title"
                }
            })],
        )
    }

    fn write_range(
        &self,
        document_id: &str,
        sheet: &str,
        start_cell: &str,
        rows: &[Vec<Value>],
    ) -> Result<(), ProviderError> {
        let range = a1_range(sheet, start_cell);
        let mut url = Url::parse(SHEETS_URL).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Malformed("sheets URL cannot be a base".to_string()))?
            .push(document_id)
            .push("values")
            .push(&range);
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let body = json!({ "range": range, "majorDimension": "ROWS", "values": rows });
        self.send(self.http.put(url).json(&body))?;
        info!("Data written to spreadsheet {} at range {}", document_id, range);
        Ok(())
    }

    fn format(
        &self,
        document_id: &str,
        sheet_id: i64,
        requests: &[FormatRequest],
    ) -> Result<(), ProviderError> {
        let requests = requests
            .iter()
            .map(|request| format_request_json(sheet_id, request))
            .collect();
        self.batch_update(document_id, requests)
    }

    fn attach_edit_guard(&self, document_id: &str, open_columns: &[&str]) -> Result<(), ProviderError> {
        let Some(check_url) = &self.edit_guard_url else {
            return Ok(());
        };

        let project: CreatedScript = self
            .send(
                self.http
                    .post(SCRIPT_PROJECTS_URL)
                    .json(&json!({ "title": EDIT_GUARD_TITLE, "parentId": document_id })),
            )?
            .json()?;

        let content = json!({
            "files": [
                {
                    "name": "Code",
                    "type": "SERVER_JS",
                    "source": edit_guard_source(check_url, open_columns)
                },
                { "name": "appsscript", "type": "JSON", "source": EDIT_GUARD_MANIFEST }
            ]
        });
        self.send(
            self.http
                .put(format!("{}/{}/content", SCRIPT_PROJECTS_URL, project.script_id))
                .json(&content),
        )?;
        info!("Edit guard script {} bound to {}", project.script_id, document_id);
        Ok(())
    }
}

fn edit_guard_source(check_url: &str, open_columns: &[&str]) -> String {
    EDIT_GUARD_SOURCE
        .replace("__CHECK_URL__", check_url)
        .replace("__OPEN_COLUMNS__", &json!(open_columns).to_string())
}

/// `'Sheet name'!A1`, with embedded quotes doubled.
fn a1_range(sheet: &str, start_cell: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), start_cell)
}

fn grid_range_json(sheet_id: i64, range: &GridRange) -> Value {
    let mut grid = json!({
        "sheetId": sheet_id,
        "startRowIndex": range.start_row,
        "endRowIndex": range.end_row,
        "startColumnIndex": range.start_column,
    });
    if let Some(end) = range.end_column {
        grid["endColumnIndex"] = json!(end);
    }
    grid
}

fn format_request_json(sheet_id: i64, request: &FormatRequest) -> Value {
    match request {
        FormatRequest::Protect { range, description } => json!({
            "addProtectedRange": {
                "protectedRange": {
                    "range": grid_range_json(sheet_id, range),
                    "description": description,
                    "warningOnly": false,
                    "editors": {},
                    "requestingUserCanEdit": true
                }
            }
        }),
        FormatRequest::Bold(range) => json!({
            "repeatCell": {
                "range": grid_range_json(sheet_id, range),
                "cell": { "userEnteredFormat": { "textFormat": { "bold": true } } },
                "fields": "userEnteredFormat.textFormat.bold"
            }
        }),
        FormatRequest::Wrap(range) => json!({
            "repeatCell": {
                "range": grid_range_json(sheet_id, range),
                "cell": { "userEnteredFormat": { "wrapStrategy": "WRAP" } },
                "fields": "userEnteredFormat.wrapStrategy"
            }
        }),
    }
}
