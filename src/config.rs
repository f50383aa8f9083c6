//! Configuration options for the habit service connection

use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, Result};

/// Service address used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";

/// Configuration options for the habit service connection
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Root URL of the service; endpoint paths are appended to it
    pub base_url: String,

    /// Per-request timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,

    /// Value of the `User-Agent` header
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            user_agent: format!("habit-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientOptions {
    /// Read `HABIT_API_URL` and `HABIT_API_TIMEOUT_SECS`, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        if let Ok(url) = std::env::var("HABIT_API_URL") {
            options = options.with_base_url(&url);
        }
        if let Ok(secs) = std::env::var("HABIT_API_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("HABIT_API_TIMEOUT_SECS is not a number: {}", secs))
            })?;
            options = options.with_request_timeout(Some(Duration::from_secs(secs)));
        }
        Ok(options)
    }

    /// Set the service root URL
    pub fn with_base_url(mut self, value: &str) -> Self {
        self.base_url = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the user agent
    pub fn with_user_agent(mut self, value: &str) -> Self {
        self.user_agent = value.to_string();
        self
    }

    /// Build the shared HTTP client these options describe
    pub fn http_client(&self) -> Result<Client> {
        let mut builder = Client::builder().user_agent(self.user_agent.clone());
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))
    }
}
