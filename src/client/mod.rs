use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::processor::ScorecardError;
use crate::processor::query_builder::{SearchAnalyticsRequest, SearchAnalyticsResponse};

pub mod oauth;

pub use oauth::{Credentials, IdentityProvider, OAuthClient};

/// Remote reporting service a session queries
pub trait ReportingApi {
    /// URLs of every property the credentials can read
    fn list_sites(&self, credentials: &Credentials) -> Result<Vec<String>, ScorecardError>;

    /// Run one search-analytics query against `site_url`
    fn query(
        &self,
        credentials: &Credentials,
        site_url: &str,
        request: &SearchAnalyticsRequest,
    ) -> Result<SearchAnalyticsResponse, ScorecardError>;
}

#[derive(Debug, Deserialize)]
struct SiteList {
    #[serde(default, rename = "siteEntry")]
    site_entry: Vec<SiteEntry>,
}

#[derive(Debug, Deserialize)]
struct SiteEntry {
    #[serde(default, rename = "siteUrl")]
    site_url: Option<String>,
}

/// Extracts property URLs from a `sites.list` body, skipping entries without one.
pub(crate) fn parse_site_list(body: &str) -> Result<Vec<String>, ScorecardError> {
    let list: SiteList = serde_json::from_str(body)
        .map_err(|e| ScorecardError::Query(format!("malformed site list: {e}")))?;
    Ok(list
        .site_entry
        .into_iter()
        .filter_map(|entry| entry.site_url)
        .filter(|url| !url.is_empty())
        .collect())
}

/// Search Console adapter over blocking HTTP
#[derive(Debug, Clone)]
pub struct HttpReportingApi {
    http: reqwest::blocking::Client,
    base_url: Url,
}

impl HttpReportingApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ScorecardError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ScorecardError::Config(format!("invalid api base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ScorecardError::Config(format!(
                "api base_url '{}' cannot carry a path",
                config.base_url
            )));
        }

        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout_secs.map(Duration::from_secs))
            .build()
            .map_err(|e| ScorecardError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(HttpReportingApi { http, base_url })
    }

    /// Base URL extended by percent-encoded path segments
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ScorecardError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ScorecardError::Config("api base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn read_body(response: reqwest::blocking::Response) -> Result<String, ScorecardError> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ScorecardError::Query(e.to_string()))?;
        check_status(status, body)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// Passes a 2xx body through; any other status becomes [`ScorecardError::Query`]
/// carrying the API's own error message when the body has one.
pub(crate) fn check_status(status: StatusCode, body: String) -> Result<String, ScorecardError> {
    if status.is_success() {
        return Ok(body);
    }
    let message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(ApiErrorBody {
            error:
                ApiError {
                    message,
                    status: Some(api_status),
                },
        }) => format!("HTTP {}: {api_status} ({message})", status.as_u16()),
        Ok(ApiErrorBody { error }) => format!("HTTP {}: {}", status.as_u16(), error.message),
        Err(_) => format!("HTTP {}: {body}", status.as_u16()),
    };
    Err(ScorecardError::Query(message))
}

pub(crate) fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ScorecardError> {
    serde_json::from_str(body).map_err(|e| ScorecardError::Query(format!("malformed response: {e}")))
}

impl ReportingApi for HttpReportingApi {
    fn list_sites(&self, credentials: &Credentials) -> Result<Vec<String>, ScorecardError> {
        let url = self.endpoint(&["sites"])?;
        debug!("Listing properties at {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&credentials.access_token)
            .send()
            .map_err(|e| ScorecardError::Query(e.to_string()))?;
        let sites = parse_site_list(&Self::read_body(response)?)?;

        info!(count = sites.len(), "listed properties");
        Ok(sites)
    }

    fn query(
        &self,
        credentials: &Credentials,
        site_url: &str,
        request: &SearchAnalyticsRequest,
    ) -> Result<SearchAnalyticsResponse, ScorecardError> {
        let url = self.endpoint(&["sites", site_url, "searchAnalytics", "query"])?;
        debug!("POST {} {}", url, serde_json::to_string(request)?);

        let response = self
            .http
            .post(url)
            .bearer_auth(&credentials.access_token)
            .json(request)
            .send()
            .map_err(|e| ScorecardError::Query(e.to_string()))?;

        decode_body(&Self::read_body(response)?)
    }
}
