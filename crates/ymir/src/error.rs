//! Authentication error types.

use gotrue_client::ClientError;
use thiserror::Error;

/// Authentication error type.
///
/// `Clone` so a single refresh outcome can be handed to every caller that
/// joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The operation needs a session and there is none
    #[error("Not signed in")]
    NotAuthenticated,

    /// Malformed redirect, missing required fields, or unusable token material
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The identity provider answered with a non-success status
    #[error("Identity provider returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    /// A provider URL could not be constructed
    #[error("Invalid URL: {0}")]
    BadUrl(String),

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The remote call did not finish within the configured timeout
    #[error("Operation timed out")]
    Timeout,

    /// The engine was shut down
    #[error("Auth engine has shut down")]
    Cancelled,

    /// The session changed while the operation was in flight; its result was discarded
    #[error("Session changed while the operation was in flight")]
    Superseded,
}

impl From<ClientError> for AuthError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, message } => AuthError::Remote { status, message },
            ClientError::BadUrl(message) => AuthError::BadUrl(message),
            ClientError::Http(e) if e.is_timeout() => AuthError::Timeout,
            ClientError::Http(e) => AuthError::Network(e.to_string()),
            ClientError::Json(e) => AuthError::Network(format!("malformed response: {}", e)),
            ClientError::InvalidSession(e) => AuthError::InvalidCredentials(e.to_string()),
        }
    }
}

impl AuthError {
    /// Returns true if this error is transient and the operation can be retried.
    ///
    /// Transient errors include:
    /// - Transport failures
    /// - Timeouts
    /// - Provider responses with a 5xx status
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Network(_) | AuthError::Timeout => true,
            AuthError::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
