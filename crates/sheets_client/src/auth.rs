//! Token storage.
//!
//! Reads/writes ~/.config/splitgrid/credentials.json (0600 on Unix).
//! `SPLITGRID_SHEETS_TOKEN` and `SPLITGRID_SHEETS_API_BASE` override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const TOKEN_ENV: &str = "SPLITGRID_SHEETS_TOKEN";
pub const API_BASE_ENV: &str = "SPLITGRID_SHEETS_API_BASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetsCredentials {
    /// Bearer token for the values API
    pub token: String,
    /// Overrides `[grid] api_base` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl SheetsCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into(), api_base: None }
    }
}

pub fn credentials_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("splitgrid/credentials.json"))
}

/// Env first, then the credentials file. None if neither has a token.
pub fn load_credentials() -> Option<SheetsCredentials> {
    let api_base_env = std::env::var(API_BASE_ENV).ok().filter(|s| !s.trim().is_empty());

    if let Some(token) = std::env::var(TOKEN_ENV).ok().filter(|s| !s.trim().is_empty()) {
        return Some(SheetsCredentials { token: token.trim().to_string(), api_base: api_base_env });
    }

    let mut creds = load_credentials_from(&credentials_file_path()?)?;
    if api_base_env.is_some() {
        creds.api_base = api_base_env;
    }
    Some(creds)
}

/// Returns None if the file is missing, unreadable or has an empty token.
pub fn load_credentials_from(path: &Path) -> Option<SheetsCredentials> {
    let contents = std::fs::read_to_string(path).ok()?;
    let creds: SheetsCredentials = serde_json::from_str(&contents).ok()?;
    if creds.token.trim().is_empty() {
        return None;
    }
    Some(creds)
}

pub fn save_credentials(creds: &SheetsCredentials) -> Result<PathBuf, String> {
    let path = credentials_file_path().ok_or("Could not determine config directory")?;
    save_credentials_to(&path, creds)?;
    Ok(path)
}

pub fn save_credentials_to(path: &Path, creds: &SheetsCredentials) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(creds)
        .map_err(|e| format!("Failed to serialize credentials: {}", e))?;

    std::fs::write(path, contents)
        .map_err(|e| format!("Failed to write credentials file: {}", e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions)
            .map_err(|e| format!("Failed to set file permissions: {}", e))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/credentials.json");

        let creds = SheetsCredentials {
            token: "ya29.test".into(),
            api_base: Some("http://127.0.0.1:9".into()),
        };
        save_credentials_to(&path, &creds).unwrap();
        assert_eq!(load_credentials_from(&path), Some(creds));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_missing_api_base_is_none() {
        let parsed: SheetsCredentials = serde_json::from_str(r#"{"token":"tok"}"#).unwrap();
        assert_eq!(parsed, SheetsCredentials::new("tok"));
    }

    #[test]
    fn test_blank_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"token":"   "}"#).unwrap();
        assert!(load_credentials_from(&path).is_none());
    }

    #[test]
    fn test_credentials_path() {
        let path = credentials_file_path().unwrap();
        assert!(path.ends_with("splitgrid/credentials.json"));
    }
}
