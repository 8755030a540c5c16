//! Storage key constants.

/// Keys used for session persistence
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized session (JSON)
    pub const SESSION: &'static str = "gotrue_session";

    /// Absolute access-token expiry (RFC 3339)
    pub const SESSION_EXPIRES_AT: &'static str = "gotrue_session_expires_at";
}
