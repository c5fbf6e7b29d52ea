//! Service configuration.
//!
//! Values come from `PENGUIN_*` environment variables. When `PENGUIN_CONFIG_PATH`
//! names a `KEY=VALUE` file, its entries are loaded first and the process
//! environment overrides them.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_SAMPLE_QUERY: &str = "SELECT * FROM dev_logs LIMIT 100";
pub const DEFAULT_DOCUMENT_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";
const DEFAULT_JSON_LIMIT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("failed to read config file at {0}")]
    ConfigFileRead(String),
    #[error("invalid config line {0} (expected KEY=VALUE)")]
    ConfigFileParse(usize),
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Catalog database holding roles, users, reports and permissions.
    pub database_path: PathBuf,
    /// Directory of source databases that queries can be validated against.
    pub databases_dir: PathBuf,
    pub json_limit_bytes: usize,
    pub provisioning: ProvisioningConfig,
    pub sheets: SheetsConfig,
}

#[derive(Debug, Clone)]
pub struct ProvisioningConfig {
    /// Query used when a report request carries a blank script.
    pub sample_query: String,
    pub document_url_prefix: String,
    /// Delete the created document when a later step fails.
    pub rollback_on_failure: bool,
}

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub client_secret_path: PathBuf,
    pub token_path: PathBuf,
    pub parent_folder_id: Option<String>,
    /// Public URL of `check-edit-permission`; enables the bound edit-guard script.
    pub edit_guard_url: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, StartupError> {
        let mut merged = HashMap::new();

        if let Ok(config_path) = std::env::var("PENGUIN_CONFIG_PATH") {
            let config_path = config_path.trim();
            if !config_path.is_empty() {
                merged.extend(parse_env_file(config_path)?);
            }
        }

        merged.extend(std::env::vars());

        Self::from_kv(&merged)
    }

    pub fn from_kv(kv: &HashMap<String, String>) -> Result<Self, StartupError> {
        let bind_addr = match non_empty(kv, "PENGUIN_BIND_ADDR") {
            None => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8083),
            Some(v) => v.parse().map_err(|_| StartupError::Invalid {
                key: "PENGUIN_BIND_ADDR",
                reason: format!("'{}' is not a socket address", v),
            })?,
        };

        let json_limit_bytes = match non_empty(kv, "PENGUIN_JSON_LIMIT_BYTES") {
            None => DEFAULT_JSON_LIMIT_BYTES,
            Some(v) => v.parse().map_err(|_| StartupError::Invalid {
                key: "PENGUIN_JSON_LIMIT_BYTES",
                reason: "must be an integer".to_string(),
            })?,
        };

        let rollback_on_failure = match non_empty(kv, "PENGUIN_ROLLBACK_ON_FAILURE") {
            None => true,
            Some(v) => parse_bool(v).ok_or_else(|| StartupError::Invalid {
                key: "PENGUIN_ROLLBACK_ON_FAILURE",
                reason: "must be true or false".to_string(),
            })?,
        };

        let edit_guard_url = non_empty(kv, "PENGUIN_EDIT_GUARD_URL").map(str::to_string);
        if let Some(url) = &edit_guard_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(StartupError::Invalid {
                    key: "PENGUIN_EDIT_GUARD_URL",
                    reason: "must be an http(s) URL".to_string(),
                });
            }
        }

        Ok(Self {
            bind_addr,
            database_path: path_or(kv, "PENGUIN_DATABASE_PATH", "penguin.sqlite"),
            databases_dir: path_or(kv, "PENGUIN_DATABASES_DIR", "databases"),
            json_limit_bytes,
            provisioning: ProvisioningConfig {
                sample_query: non_empty(kv, "PENGUIN_SAMPLE_QUERY")
                    .unwrap_or(DEFAULT_SAMPLE_QUERY)
                    .to_string(),
                document_url_prefix: non_empty(kv, "PENGUIN_DOCUMENT_URL_PREFIX")
                    .unwrap_or(DEFAULT_DOCUMENT_URL_PREFIX)
                    .to_string(),
                rollback_on_failure,
            },
            sheets: SheetsConfig {
                client_secret_path: path_or(kv, "PENGUIN_GOOGLE_CLIENT_SECRET", "credentials.json"),
                token_path: path_or(kv, "PENGUIN_GOOGLE_TOKEN", "token.json"),
                parent_folder_id: non_empty(kv, "PENGUIN_DRIVE_FOLDER_ID").map(str::to_string),
                edit_guard_url,
            },
        })
    }
}

fn non_empty<'a>(kv: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    kv.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn path_or(kv: &HashMap<String, String>, key: &str, default: &str) -> PathBuf {
    PathBuf::from(non_empty(kv, key).unwrap_or(default))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}

fn parse_env_file(path: &str) -> Result<HashMap<String, String>, StartupError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|_| StartupError::ConfigFileRead(path.to_string()))?;

    let mut kv = HashMap::new();
    for (idx, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or(StartupError::ConfigFileParse(idx + 1))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(StartupError::ConfigFileParse(idx + 1));
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        kv.insert(key.to_string(), value.to_string());
    }

    Ok(kv)
}
