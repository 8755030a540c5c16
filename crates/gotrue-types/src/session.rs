//! Session and user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Reasons a set of token fields cannot form a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("access token is empty")]
    EmptyAccessToken,

    #[error("refresh token is empty")]
    EmptyRefreshToken,

    #[error("expires_in must be greater than zero")]
    NonPositiveExpiry,
}

/// User profile as returned by the identity provider.
///
/// Treated as opaque by the engine apart from `id`. Unknown fields sent by
/// the provider are dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Provider-controlled metadata (roles, provider list).
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    /// User-editable metadata.
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl User {
    /// Minimal user with only an id, mostly useful for fixtures.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aud: None,
            role: None,
            email: None,
            phone: None,
            email_confirmed_at: None,
            phone_confirmed_at: None,
            last_sign_in_at: None,
            created_at: None,
            updated_at: None,
            app_metadata: Map::new(),
            user_metadata: Map::new(),
        }
    }
}

/// An authenticated session: token material plus the user it belongs to.
///
/// Immutable once built. Construction validates that both tokens are
/// non-empty and that the lifetime is positive, and decoding goes through
/// the same checks. Object maps serialize in key order, so equal sessions
/// always serialize to equal bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SessionFields", into = "SessionFields")]
pub struct Session {
    access_token: String,
    token_type: String,
    expires_in: u64,
    refresh_token: String,
    user: User,
}

/// Wire shape of a session. Extra fields such as `expires_at` or
/// `provider_token` are ignored.
#[derive(Serialize, Deserialize)]
struct SessionFields {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: u64,
    refresh_token: String,
    user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TryFrom<SessionFields> for Session {
    type Error = SessionError;

    fn try_from(fields: SessionFields) -> Result<Self, Self::Error> {
        Session::new(
            fields.access_token,
            fields.token_type,
            fields.expires_in,
            fields.refresh_token,
            fields.user,
        )
    }
}

impl From<Session> for SessionFields {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.access_token,
            token_type: session.token_type,
            expires_in: session.expires_in,
            refresh_token: session.refresh_token,
            user: session.user,
        }
    }
}

impl Session {
    /// Build a session, rejecting empty tokens and a zero lifetime.
    pub fn new(
        access_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_in: u64,
        refresh_token: impl Into<String>,
        user: User,
    ) -> Result<Self, SessionError> {
        let access_token = access_token.into();
        let refresh_token = refresh_token.into();

        if access_token.is_empty() {
            return Err(SessionError::EmptyAccessToken);
        }
        if refresh_token.is_empty() {
            return Err(SessionError::EmptyRefreshToken);
        }
        if expires_in == 0 {
            return Err(SessionError::NonPositiveExpiry);
        }

        Ok(Self {
            access_token,
            token_type: token_type.into(),
            expires_in,
            refresh_token,
            user,
        })
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Lifetime of the access token, relative to when it was issued.
    pub fn expires_in(&self) -> Duration {
        Duration::from_secs(self.expires_in)
    }

    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in
    }

    /// Same token material with a different user record.
    pub fn with_user(&self, user: User) -> Self {
        Self {
            user,
            ..self.clone()
        }
    }
}

/// Sign-up returns a full session when the provider auto-confirms the
/// account, and only the pending user otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpResponse {
    Session(Session),
    User(User),
}
