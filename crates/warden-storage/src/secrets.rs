//! High-level API for persisting the session.

use chrono::{DateTime, Utc};
use gotrue_types::Session;
use std::time::Duration;

use crate::{SecureStorage, SessionStore, StorageError, StorageKeys, StorageResult};

/// A session together with the wall-clock time its access token expires.
///
/// The session bytes and the expiry are stored under separate keys, so the
/// stored session depends only on the session's own fields.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub session: Session,
    pub expires_at: DateTime<Utc>,
}

impl PersistedSession {
    /// Stamp a freshly issued session with its absolute expiry.
    pub fn issued_at(session: Session, issued_at: DateTime<Utc>) -> Self {
        let secs = i64::try_from(session.expires_in_secs())
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let lifetime = chrono::Duration::seconds(secs);
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            session,
            expires_at,
        }
    }

    pub fn issued_now(session: Session) -> Self {
        Self::issued_at(session, Utc::now())
    }

    /// Time left until expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        (self.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// High-level API for storing and retrieving the session
pub struct SecretsManager {
    storage: Box<dyn SecureStorage>,
}

impl SecretsManager {
    /// Create a new secrets manager with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Store the session and its expiry.
    ///
    /// The old expiry is removed first, so a session whose expiry write fails
    /// reads back as issued now rather than with the previous session's expiry.
    pub fn set_session(&self, persisted: &PersistedSession) -> StorageResult<()> {
        let json = serde_json::to_string(&persisted.session)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.delete(StorageKeys::SESSION_EXPIRES_AT)?;
        self.storage.set(StorageKeys::SESSION, &json)?;
        self.storage.set(
            StorageKeys::SESSION_EXPIRES_AT,
            &persisted.expires_at.to_rfc3339(),
        )
    }

    /// Retrieve the stored session.
    ///
    /// A session without a readable expiry is treated as issued now.
    pub fn get_session(&self) -> StorageResult<Option<PersistedSession>> {
        let Some(json) = self.storage.get(StorageKeys::SESSION)? else {
            return Ok(None);
        };
        let session: Session =
            serde_json::from_str(&json).map_err(|e| StorageError::Encoding(e.to_string()))?;

        let expires_at = match self.storage.get(StorageKeys::SESSION_EXPIRES_AT)? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| StorageError::Encoding(e.to_string()))?,
            None => {
                tracing::debug!("Stored session has no expiry, assuming it was issued now");
                return Ok(Some(PersistedSession::issued_now(session)));
            }
        };

        Ok(Some(PersistedSession {
            session,
            expires_at,
        }))
    }

    /// Check if a session is stored
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::SESSION)
    }

    /// Clear the stored session
    pub fn clear_session(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::SESSION)?;
        self.storage.delete(StorageKeys::SESSION_EXPIRES_AT)?;
        Ok(())
    }
}

impl SessionStore for SecretsManager {
    fn get(&self) -> StorageResult<Option<PersistedSession>> {
        self.get_session()
    }

    fn save(&self, session: &PersistedSession) -> StorageResult<()> {
        self.set_session(session)
    }

    fn remove(&self) -> StorageResult<()> {
        self.clear_session()
    }
}
