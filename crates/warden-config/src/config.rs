//! Configuration management.

use crate::logging::normalize_level;
use crate::{ConfigError, ConfigResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default GoTrue URL (can be overridden at compile time via WARDEN_GOTRUE_URL env var).
pub const DEFAULT_GOTRUE_URL: &str = match option_env!("WARDEN_GOTRUE_URL") {
    Some(url) => url,
    None => "http://localhost:9999",
};

/// Default anon key (can be overridden at compile time via WARDEN_ANON_KEY env var).
pub const DEFAULT_ANON_KEY: &str = match option_env!("WARDEN_ANON_KEY") {
    Some(key) => key,
    None => "",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default bound on each request to the identity provider.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Main configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Base URL of the GoTrue server or Supabase project.
    pub gotrue_url: String,
    /// Public API key sent as the `apikey` header.
    pub anon_key: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Refresh the session automatically before it expires.
    pub auto_refresh: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            gotrue_url: DEFAULT_GOTRUE_URL.to_string(),
            anon_key: DEFAULT_ANON_KEY.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            auto_refresh: true,
        }
    }
}

impl Config {
    /// Load configuration from `paths`, falling back to defaults, then
    /// apply `WARDEN_*` environment overrides.
    pub fn load(paths: &Paths) -> ConfigResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Self::default()
        };

        let overridden = config.apply_env(|key| std::env::var(key).ok())?;
        if !overridden.is_empty() {
            debug!(keys = ?overridden, "Applied environment overrides");
        }
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file. Missing keys take defaults.
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> ConfigResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override settings from environment variables, read through `lookup`.
    ///
    /// Returns the names of the variables that were applied.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<Vec<&'static str>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();
        if let Some(level) = lookup("WARDEN_LOG_LEVEL") {
            self.log_level = normalize_level(&level)?;
            applied.push("WARDEN_LOG_LEVEL");
        }
        if let Some(url) = lookup("WARDEN_GOTRUE_URL") {
            self.gotrue_url = url;
            applied.push("WARDEN_GOTRUE_URL");
        }
        if let Some(key) = lookup("WARDEN_ANON_KEY") {
            self.anon_key = key;
            applied.push("WARDEN_ANON_KEY");
        }
        if let Some(raw) = lookup("WARDEN_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "request_timeout_secs",
                message: format!("expected a whole number of seconds, got {:?}", raw),
            })?;
            applied.push("WARDEN_REQUEST_TIMEOUT_SECS");
        }
        if let Some(raw) = lookup("WARDEN_AUTO_REFRESH") {
            self.auto_refresh = parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "auto_refresh",
                message: format!("expected true or false, got {:?}", raw),
            })?;
            applied.push("WARDEN_AUTO_REFRESH");
        }
        Ok(applied)
    }

    /// Check that every setting is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        normalize_level(&self.log_level)?;
        self.gotrue_url()?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the GoTrue URL as a parsed URL.
    pub fn gotrue_url(&self) -> ConfigResult<Url> {
        Url::parse(&self.gotrue_url).map_err(ConfigError::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
