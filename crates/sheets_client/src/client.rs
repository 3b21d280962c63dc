//! Spreadsheet values API client.
//!
//! Blocking reqwest client (no Tokio runtime required). One request per
//! cell: `GET` to read, `PUT` with `valueInputOption=USER_ENTERED` to write.
//! Values go out as plain decimal strings ("5.01") so the sheet stores a
//! number; reads accept either decimal separator.

use std::time::Duration;

use reqwest::Url;
use splitgrid_core::{format_cents, parse_amount, CellAddress};
use splitgrid_recon::{GridError, GridStore};

use crate::auth::{load_credentials, SheetsCredentials};

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// Values API client (blocking).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
    sheet_name: String,
}

#[derive(Debug)]
pub enum SheetsError {
    /// No token in env or credentials file
    NotAuthenticated,
    /// Client could not be built or URL is malformed
    Config(String),
    /// Network error
    Network(String),
    /// HTTP error with status code and body
    Http(u16, String),
    /// Response body or cell content could not be read
    Parse(String),
}

impl std::fmt::Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsError::NotAuthenticated => {
                write!(f, "Not authenticated: run `sgrid login --token <TOKEN>` or set SPLITGRID_SHEETS_TOKEN")
            }
            SheetsError::Config(msg) => write!(f, "Client configuration error: {}", msg),
            SheetsError::Network(msg) => write!(f, "Network error: {}", msg),
            SheetsError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            SheetsError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for SheetsError {}

impl From<SheetsError> for GridError {
    fn from(e: SheetsError) -> Self {
        match e {
            SheetsError::Http(status, message) => GridError::Rejected { status, message },
            SheetsError::Parse(msg) => GridError::Parse(msg),
            other => GridError::Transport(other.to_string()),
        }
    }
}

impl SheetsClient {
    /// Client from env or saved credentials. A base URL in the credentials
    /// wins over `api_base`.
    pub fn from_saved_credentials(api_base: &str, sheet_name: &str) -> Result<Self, SheetsError> {
        let creds = load_credentials().ok_or(SheetsError::NotAuthenticated)?;
        let base = creds.api_base.clone().unwrap_or_else(|| api_base.to_string());
        Self::with_base_url(creds, base, sheet_name)
    }

    pub fn new(creds: SheetsCredentials, sheet_name: &str) -> Result<Self, SheetsError> {
        Self::with_base_url(creds, DEFAULT_API_BASE.to_string(), sheet_name)
    }

    pub fn with_base_url(
        creds: SheetsCredentials,
        api_base: String,
        sheet_name: &str,
    ) -> Result<Self, SheetsError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sgrid/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SheetsError::Config(e.to_string()))?;

        Ok(Self {
            http,
            api_base,
            token: creds.token,
            sheet_name: sheet_name.to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Read one cell. `None` for an empty cell.
    pub fn get_value(&self, spreadsheet_id: &str, address: &CellAddress) -> Result<Option<i64>, SheetsError> {
        let url = self.values_url(spreadsheet_id, address)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        let response = check_status(response)?;

        let json: serde_json::Value = response.json().map_err(|e| SheetsError::Parse(e.to_string()))?;
        parse_cell(&json["values"][0][0])
    }

    /// Overwrite one cell.
    pub fn put_value(&self, spreadsheet_id: &str, address: &CellAddress, cents: i64) -> Result<(), SheetsError> {
        let mut url = self.values_url(spreadsheet_id, address)?;
        url.query_pairs_mut().append_pair("valueInputOption", "USER_ENTERED");

        let body = serde_json::json!({
            "range": self.range(address),
            "majorDimension": "ROWS",
            "values": [[format_cents(cents)]],
        });

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;
        check_status(response)?;
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn range(&self, address: &CellAddress) -> String {
        format!("{}!{}", self.sheet_name, address)
    }

    fn values_url(&self, spreadsheet_id: &str, address: &CellAddress) -> Result<Url, SheetsError> {
        let range = self.range(address);
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| SheetsError::Config(format!("bad api base '{}': {e}", self.api_base)))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::Config(format!("api base '{}' cannot take a path", self.api_base)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range.as_str()]);
        Ok(url)
    }
}

impl GridStore for SheetsClient {
    fn read_cell(&self, grid_id: &str, address: &CellAddress) -> Result<Option<i64>, GridError> {
        Ok(self.get_value(grid_id, address)?)
    }

    fn write_cell(&self, grid_id: &str, address: &CellAddress, value_cents: i64) -> Result<(), GridError> {
        log::debug!("PUT {}!{} = {}", grid_id, address, format_cents(value_cents));
        Ok(self.put_value(grid_id, address, value_cents)?)
    }
}

// ── Free functions ──────────────────────────────────────────────────

fn check_status(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, SheetsError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or(body);
    Err(SheetsError::Http(status.as_u16(), message))
}

/// `{"error": {"message": ...}}` → message.
fn extract_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json["error"]["message"].as_str().map(String::from)
}

/// Cell content → cents. Accepts numbers, "5.01", "5,01" and blanks.
fn parse_cell(value: &serde_json::Value) -> Result<Option<i64>, SheetsError> {
    let text = match value {
        serde_json::Value::Null => return Ok(None),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => return Err(SheetsError::Parse(format!("unexpected cell value {other}"))),
    };
    if text.is_empty() {
        return Ok(None);
    }
    parse_amount(&text)
        .map(Some)
        .map_err(|e| SheetsError::Parse(format!("cell value '{text}': {e}")))
}
