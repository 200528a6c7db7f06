//! Authorization-code exchange against the identity provider.

use std::fmt;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::InstalledApp;
use crate::processor::ScorecardError;

/// Read-only Search Console scope
pub const SCOPE: &str = "https://www.googleapis.com/auth/webmasters.readonly";

/// Access/refresh credential pair returned by the token endpoint
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credentials {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Credentials {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            token_type: default_token_type(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Turns a user-pasted authorization code into credentials
pub trait IdentityProvider {
    fn exchange_code(&self, code: &str) -> Result<Credentials, ScorecardError>;
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth2 client for an installed application
#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_uri: Url,
    token_uri: Url,
    http: reqwest::blocking::Client,
}

impl OAuthClient {
    pub fn new(app: &InstalledApp, timeout: Option<Duration>) -> Result<Self, ScorecardError> {
        let redirect_uri = app
            .redirect_uris
            .first()
            .cloned()
            .ok_or_else(|| ScorecardError::Config("no redirect URI configured".into()))?;
        let auth_uri = Url::parse(&app.auth_uri)
            .map_err(|e| ScorecardError::Config(format!("invalid auth_uri: {e}")))?;
        let token_uri = Url::parse(&app.token_uri)
            .map_err(|e| ScorecardError::Config(format!("invalid token_uri: {e}")))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScorecardError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(OAuthClient {
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            redirect_uri,
            auth_uri,
            token_uri,
            http,
        })
    }

    /// Consent page the user visits to obtain an authorization code
    pub fn authorization_url(&self) -> Url {
        let mut url = self.auth_uri.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", SCOPE)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");
        url
    }
}

impl IdentityProvider for OAuthClient {
    fn exchange_code(&self, code: &str) -> Result<Credentials, ScorecardError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ScorecardError::AuthExchange(
                "authorization code is empty".into(),
            ));
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        debug!("Exchanging authorization code at endpoint: {}", self.token_uri);

        let response = self
            .http
            .post(self.token_uri.clone())
            .form(&form)
            .send()
            .map_err(|e| ScorecardError::AuthExchange(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ScorecardError::AuthExchange(e.to_string()))?;

        if !status.is_success() {
            warn!("Token exchange rejected with status {}", status);
            return Err(ScorecardError::AuthExchange(describe_token_error(
                status.as_u16(),
                &body,
            )));
        }

        let credentials = parse_token_response(&body)?;
        info!(
            has_refresh_token = credentials.refresh_token.is_some(),
            "authorization code exchanged"
        );
        Ok(credentials)
    }
}

pub(crate) fn parse_token_response(body: &str) -> Result<Credentials, ScorecardError> {
    let credentials: Credentials = serde_json::from_str(body)
        .map_err(|e| ScorecardError::AuthExchange(format!("malformed token response: {e}")))?;
    if credentials.access_token.is_empty() {
        return Err(ScorecardError::AuthExchange(
            "token response carries an empty access token".into(),
        ));
    }
    Ok(credentials)
}

pub(crate) fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenError>(body) {
        Ok(TokenError {
            error,
            error_description: Some(description),
        }) => format!("HTTP {status}: {error} ({description})"),
        Ok(TokenError { error, .. }) => format!("HTTP {status}: {error}"),
        Err(_) => format!("HTTP {status}: {body}"),
    }
}
