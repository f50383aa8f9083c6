//! Error taxonomy for calls against the habit service

use thiserror::Error;

/// Failure of a single remote call.
///
/// A business-level "not found" is never reported here; callers read that
/// from the shape of a successful response.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No usable response arrived (connect failure, reset, timeout)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body could not be decoded into the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service answered with a non-success status
    #[error("Server rejected request with status {status}: {message}")]
    ServerRejected { status: u16, message: String },

    /// The configured base URL could not be turned into an endpoint
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The base URL parses but cannot carry endpoint path segments
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ClientError {
    pub fn invalid_response<T: std::fmt::Display>(msg: T) -> Self {
        ClientError::InvalidResponse(msg.to_string())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ClientError::Network(_))
    }

    pub fn is_server_rejected(&self) -> bool {
        matches!(self, ClientError::ServerRejected { .. })
    }

    /// HTTP status carried by a rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ServerRejected { status, .. } => Some(*status),
            ClientError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
