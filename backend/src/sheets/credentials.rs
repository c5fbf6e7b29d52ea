//! OAuth credentials for the Google APIs.
//!
//! The service never runs the interactive consent flow. It expects a token file
//! produced out of band and refreshes it with the client secret when it is
//! about to expire.

use super::ProviderError;
use chrono::{DateTime, Datelike, Duration, Utc};
use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl StoredToken {
    /// Tokens written with a zero expiry never expire.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry.year() > 1 => {
                expiry - now < Duration::seconds(EXPIRY_SKEW_SECS)
            }
            _ => false,
        }
    }

    fn apply(&mut self, refreshed: RefreshResponse, now: DateTime<Utc>) {
        self.access_token = refreshed.access_token;
        if let Some(token_type) = refreshed.token_type {
            self.token_type = token_type;
        }
        if refreshed.refresh_token.is_some() {
            self.refresh_token = refreshed.refresh_token;
        }
        self.expiry = refreshed.expires_in.map(|secs| now + Duration::seconds(secs));
    }
}

/// Returns a bearer token usable against the Google APIs.
pub(crate) fn access_token(
    http: &Client,
    client_secret_path: &Path,
    token_path: &Path,
) -> Result<String, ProviderError> {
    let mut token = read_token(token_path)?;
    if !token.needs_refresh(Utc::now()) {
        return Ok(token.access_token);
    }

    let refresh_token = token.refresh_token.clone().ok_or_else(|| {
        ProviderError::Credentials("stored token expired and has no refresh token".to_string())
    })?;
    let secret = read_client_secret(client_secret_path)?;

    let response = http
        .post(&secret.token_uri)
        .form(&[
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ])
        .send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Credentials(format!(
            "token refresh rejected with {}",
            status
        )));
    }
    let refreshed: RefreshResponse = response.json()?;
    token.apply(refreshed, Utc::now());
    info!("Refreshed OAuth access token");

    if let Err(e) = write_token(token_path, &token) {
        warn!("Could not store refreshed token at {}: {}", token_path.display(), e);
    }

    Ok(token.access_token)
}

fn read_token(path: &Path) -> Result<StoredToken, ProviderError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ProviderError::Credentials(format!(
            "token not found at {}, run the authorization flow first: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Credentials(format!("invalid token file: {}", e)))
}

fn write_token(path: &Path, token: &StoredToken) -> std::io::Result<()> {
    let body = serde_json::to_vec_pretty(token)?;
    std::fs::write(path, body)
}

fn read_client_secret(path: &Path) -> Result<ClientSecret, ProviderError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ProviderError::Credentials(format!(
            "unable to read client secret file {}: {}",
            path.display(),
            e
        ))
    })?;
    let file: ClientSecretFile = serde_json::from_str(&raw)
        .map_err(|e| ProviderError::Credentials(format!("invalid client secret file: {}", e)))?;
    file.installed
        .or(file.web)
        .ok_or_else(|| ProviderError::Credentials("client secret has no installed or web section".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token(expiry: Option<DateTime<Utc>>) -> StoredToken {
        StoredToken {
            access_token: "ya29.a".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: Some("1//r".to_string()),
            expiry,
        }
    }

    #[test]
    fn fresh_token_is_used_as_is() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(!token(Some(now + Duration::minutes(30))).needs_refresh(now));
        assert!(!token(None).needs_refresh(now));
    }

    #[test]
    fn token_near_expiry_needs_refresh() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert!(token(Some(now + Duration::seconds(30))).needs_refresh(now));
        assert!(token(Some(now - Duration::hours(1))).needs_refresh(now));
    }

    #[test]
    fn zero_expiry_means_no_expiry() {
        let raw = r#"{"access_token":"a","token_type":"Bearer","expiry":"0001-01-01T00:00:00Z"}"#;
        let parsed: StoredToken = serde_json::from_str(raw).unwrap();
        assert!(!parsed.needs_refresh(Utc::now()));
    }

    #[test]
    fn refresh_keeps_refresh_token_when_not_rotated() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut stored = token(Some(now));
        stored.apply(
            RefreshResponse {
                access_token: "ya29.b".to_string(),
                expires_in: Some(3599),
                token_type: None,
                refresh_token: None,
            },
            now,
        );
        assert_eq!(stored.access_token, "ya29.b");
        assert_eq!(stored.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(stored.expiry, Some(now + Duration::seconds(3599)));
    }

    #[test]
    fn missing_token_file_is_a_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_token(&dir.path().join("token.json")).unwrap_err();
        assert!(matches!(err, ProviderError::Credentials(_)));
    }

    #[test]
    fn client_secret_accepts_web_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{"web":{"client_id":"id","client_secret":"s"}}"#,
        )
        .unwrap();
        let secret = read_client_secret(&path).unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri, DEFAULT_TOKEN_URI);
    }
}
