//! Session persistence for Warden.
//!
//! This crate provides:
//! - [`SecureStorage`], a small key-value trait for secret backends
//! - [`MemoryStorage`] and [`FileStorage`] backends
//! - [`SecretsManager`], which stores a [`PersistedSession`] on top of any
//!   backend and implements [`SessionStore`] for the session engine

mod file;
mod keys;
mod memory;
mod secrets;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use secrets::{PersistedSession, SecretsManager};
pub use traits::{SecureStorage, SessionStore};

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
