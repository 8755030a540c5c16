//! Engine tuning knobs.

use std::time::Duration;

/// Default bound on every remote call made by the engine.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the diagnostic broadcast channel.
pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 16;

/// Configuration for [`AuthEngine`](crate::AuthEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Arm a refresh timer on every adoption. When false the caller is
    /// responsible for calling `refresh_session`.
    pub auto_refresh: bool,
    /// Upper bound on each remote call; exceeding it yields `AuthError::Timeout`.
    pub request_timeout: Duration,
    /// Buffered diagnostics per receiver before the oldest are dropped.
    pub diagnostic_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_refresh: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
