//! Client configuration.

use reqwest::Url;
use std::time::Duration;

use crate::error::{ApiError, Result};

/// Per-attempt timeout. Each rung of the ladder gets its own budget.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

const DEFAULT_USER_AGENT: &str = concat!("catalog-sync/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// The single catalog endpoint, without the `action` parameter.
    pub endpoint: String,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl ApiConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim().to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Parses and validates the endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        if self.endpoint.is_empty() {
            return Err(ApiError::config("Catalog endpoint is empty"));
        }
        let url = Url::parse(&self.endpoint)
            .map_err(|e| ApiError::invalid_url(format!("{}: {}", self.endpoint, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ApiError::config(format!(
                "Unsupported endpoint scheme '{}'",
                other
            ))),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(ApiError::config("Request timeout must be greater than zero"));
        }
        self.endpoint_url().map(|_| ())
    }
}
