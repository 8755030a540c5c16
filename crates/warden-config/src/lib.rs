//! Configuration, paths and logging bootstrap for Warden binaries.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_ANON_KEY, DEFAULT_GOTRUE_URL, DEFAULT_LOG_LEVEL, DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, normalize_level, LOG_LEVELS};
pub use paths::Paths;
