//! Logging initialization for Warden binaries.
//!
//! Thin wrapper over the observability crate: structured JSONL goes to
//! `~/.warden/logs/warden.jsonl`, optionally mirrored to stderr.

use crate::{ConfigError, ConfigResult, Paths};
use std::path::PathBuf;

/// Accepted log levels, most verbose first.
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate and lowercase a log level.
pub fn normalize_level(level: &str) -> ConfigResult<String> {
    let level = level.trim().to_ascii_lowercase();
    if LOG_LEVELS.contains(&level.as_str()) {
        Ok(level)
    } else {
        Err(ConfigError::Invalid {
            key: "log_level",
            message: format!("expected one of {}, got {:?}", LOG_LEVELS.join(", "), level),
        })
    }
}

/// Initialize the logging system for a Warden binary.
///
/// `RUST_LOG` takes precedence over `level`. Returns the log file path.
pub fn init_logging(paths: &Paths, level: &str, also_stderr: bool) -> ConfigResult<PathBuf> {
    let path = observability::init_with_config(observability::LogConfig {
        service_name: "warden".into(),
        default_level: level.into(),
        log_path: Some(paths.log_file()),
        also_stderr,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level("DEBUG").unwrap(), "debug");
        assert_eq!(normalize_level(" warn ").unwrap(), "warn");
        assert!(matches!(
            normalize_level("verbose"),
            Err(ConfigError::Invalid {
                key: "log_level",
                ..
            })
        ));
    }
}
