//! Client error types.

use gotrue_types::SessionError;
use thiserror::Error;

/// Errors produced while talking to the identity provider.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The provider answered with a non-success status.
    #[error("GoTrue returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A URL could not be built or parsed
    #[error("Invalid URL: {0}")]
    BadUrl(String),

    /// Transport failure (connect, TLS, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider returned token fields that do not form a session
    #[error("Invalid session from provider: {0}")]
    InvalidSession(#[from] SessionError),
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::BadUrl(err.to_string())
    }
}

impl ClientError {
    /// Returns true if this error is transient and the request can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Api { status, .. } => *status >= 500,
            ClientError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                e.status().map(|s| s.is_server_error()).unwrap_or(false)
            }
            _ => false,
        }
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
