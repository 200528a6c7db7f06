//! Client secrets and API settings.
//!
//! The file layout mirrors the installed-application secrets downloaded from
//! the cloud console, with an optional `[api]` table:
//!
//! ```toml
//! [installed]
//! client_id = "1234.apps.googleusercontent.com"
//! client_secret = "..."
//! redirect_uris = ["urn:ietf:wg:oauth:2.0:oob"]
//!
//! [api]
//! base_url = "https://www.googleapis.com/webmasters/v3"
//! timeout_secs = 60
//! ```
//!
//! `GSC_CLIENT_ID`, `GSC_CLIENT_SECRET` and `GSC_REDIRECT_URI` override the
//! file values.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::processor::ScorecardError;

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://accounts.google.com/o/oauth2/token";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/webmasters/v3";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub installed: InstalledApp,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Clone, Deserialize)]
pub struct InstalledApp {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl Default for InstalledApp {
    fn default() -> Self {
        InstalledApp {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uris: Vec::new(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }
}

impl std::fmt::Debug for InstalledApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstalledApp")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uris", &self.redirect_uris)
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    /// Unset means requests never time out
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_api_base_url(),
            timeout_secs: None,
        }
    }
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ScorecardError> {
        toml::from_str(raw).map_err(|e| ScorecardError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ScorecardError> {
        debug!("Loading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Config::from_toml_str(&raw)
    }

    /// Loads the file if given, applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ScorecardError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GSC_CLIENT_ID") {
            self.installed.client_id = v;
        }
        if let Some(v) = lookup("GSC_CLIENT_SECRET") {
            self.installed.client_secret = v;
        }
        if let Some(v) = lookup("GSC_REDIRECT_URI") {
            self.installed.redirect_uris = vec![v];
        }
    }

    pub fn validate(&self) -> Result<(), ScorecardError> {
        let mut missing = Vec::new();
        if self.installed.client_id.trim().is_empty() {
            missing.push("installed.client_id");
        }
        if self.installed.client_secret.trim().is_empty() {
            missing.push("installed.client_secret");
        }
        if self.installed.redirect_uris.is_empty() {
            missing.push("installed.redirect_uris");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScorecardError::Config(format!(
                "missing settings: {}",
                missing.join(", ")
            )))
        }
    }
}
