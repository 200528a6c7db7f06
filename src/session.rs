use tracing::info;

use crate::client::{Credentials, IdentityProvider, ReportingApi};
use crate::processor::ScorecardError;

/// Authorized session: credentials plus the properties they can read.
///
/// Created once by [`Session::authorize`] and read-only afterwards. Credentials
/// are never refreshed; an expired access token surfaces as a query failure.
#[derive(Debug, Clone)]
pub struct Session {
    credentials: Credentials,
    site_urls: Vec<String>,
}

/// Authenticated handle on one property of a session
#[derive(Debug, Clone, Copy)]
pub struct Property<'a> {
    credentials: &'a Credentials,
    site_url: &'a str,
}

impl<'a> Property<'a> {
    pub fn credentials(&self) -> &'a Credentials {
        self.credentials
    }

    pub fn site_url(&self) -> &'a str {
        self.site_url
    }
}

impl Session {
    /// Exchange `code` for credentials, then cache the property list.
    ///
    /// Either step failing aborts the whole authorization; nothing is retried.
    pub fn authorize(
        identity: &dyn IdentityProvider,
        api: &dyn ReportingApi,
        code: &str,
    ) -> Result<Self, ScorecardError> {
        let credentials = identity.exchange_code(code)?;
        let site_urls = api.list_sites(&credentials)?;
        info!(properties = site_urls.len(), "session authorized");
        Ok(Session::new(credentials, site_urls))
    }

    pub fn new(credentials: Credentials, site_urls: Vec<String>) -> Self {
        Session {
            credentials,
            site_urls,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn site_urls(&self) -> &[String] {
        &self.site_urls
    }

    /// Handle on `site_url`, which must be one of the session's properties.
    pub fn property(&self, site_url: &str) -> Result<Property<'_>, ScorecardError> {
        let site_url = self
            .site_urls
            .iter()
            .find(|s| s.as_str() == site_url)
            .ok_or_else(|| {
                ScorecardError::InvalidSelection(format!(
                    "'{site_url}' is not a property of this account"
                ))
            })?;

        Ok(Property {
            credentials: &self.credentials,
            site_url,
        })
    }
}
