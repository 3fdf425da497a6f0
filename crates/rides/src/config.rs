//! Settings for reaching the import proxy
//!
//! Loaded from (in order of priority):
//! 1. JSON file in the CycleGraph config directory (`ride-import.json`)
//! 2. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings filename in the CycleGraph config directory
const SETTINGS_FILE: &str = "ride-import.json";

/// API base used by a local development server
pub const DEFAULT_BASE_URL: &str = "http://localhost:5175/api/strava";
/// Session cookie set by the CycleGraph login flow
pub const DEFAULT_COOKIE_NAME: &str = "cg_uid";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the sync proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Base URL of the Strava import routes; `/sync` is appended
    pub base_url: String,
    /// Value of the session cookie (the signed-in user's id)
    #[serde(default)]
    pub session_cookie: Option<String>,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Timeout for a single proxy call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            session_cookie: None,
            cookie_name: default_cookie_name(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ImportSettings {
    /// Load settings from the config file, falling back to the environment
    pub fn load() -> Result<Self> {
        if config::config_exists(SETTINGS_FILE) {
            return config::load_json(SETTINGS_FILE);
        }
        Ok(Self::from_env())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse import settings JSON")
    }

    /// Read `CG_API_BASE`, `CG_UID` and `CG_REQUEST_TIMEOUT_SECS`
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(base) = std::env::var("CG_API_BASE") {
            if !base.trim().is_empty() {
                settings.base_url = base.trim().to_string();
            }
        }
        settings.session_cookie = std::env::var("CG_UID")
            .ok()
            .map(|uid| uid.trim().to_string())
            .filter(|uid| !uid.is_empty());
        if let Some(secs) = std::env::var("CG_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse().ok())
        {
            settings.request_timeout_secs = secs;
        }
        settings
    }

    /// Get the default settings file path
    pub fn default_settings_path() -> Option<PathBuf> {
        config::config_path(SETTINGS_FILE)
    }

    pub fn with_session_cookie(mut self, value: impl Into<String>) -> Self {
        self.session_cookie = Some(value.into());
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// `Cookie` header value, if a session is configured
    pub fn cookie_header(&self) -> Option<String> {
        self.session_cookie
            .as_ref()
            .map(|value| format!("{}={}", self.cookie_name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_settings() {
        let json = r#"{
            "base_url": "https://cyclegraph.example/api/strava",
            "session_cookie": "u_42",
            "cookie_name": "sid",
            "request_timeout_secs": 15
        }"#;

        let settings = ImportSettings::from_json(json).unwrap();
        assert_eq!(settings.base_url, "https://cyclegraph.example/api/strava");
        assert_eq!(settings.cookie_header().as_deref(), Some("sid=u_42"));
        assert_eq!(settings.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_parse_minimal_settings() {
        let settings = ImportSettings::from_json(r#"{"base_url": "http://127.0.0.1:9"}"#).unwrap();
        assert_eq!(settings.cookie_name, "cg_uid");
        assert_eq!(settings.session_cookie, None);
        assert_eq!(settings.cookie_header(), None);
        assert_eq!(settings.request_timeout_secs, 60);
    }

    #[test]
    fn test_missing_base_url_is_error() {
        assert!(ImportSettings::from_json(r#"{ "session_cookie": "x" }"#).is_err());
    }

    #[test]
    fn test_zero_timeout_is_bumped() {
        let settings = ImportSettings {
            request_timeout_secs: 0,
            ..ImportSettings::default()
        };
        assert_eq!(settings.request_timeout(), Duration::from_secs(1));
    }
}
