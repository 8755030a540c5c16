//! Storage trait definitions.

use crate::{PersistedSession, StorageResult};

/// Trait for key-value secret backends
pub trait SecureStorage: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value, returning whether it existed
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Durable home of the single current session.
///
/// Writes are best-effort from the engine's point of view: failures are
/// logged, never surfaced to auth callers.
pub trait SessionStore: Send + Sync {
    /// Load the persisted session, if any.
    fn get(&self) -> StorageResult<Option<PersistedSession>>;

    /// Replace the persisted session.
    fn save(&self, session: &PersistedSession) -> StorageResult<()>;

    /// Forget the persisted session. Removing nothing is not an error.
    fn remove(&self) -> StorageResult<()>;
}
