//! TOML-based configuration system for QuoteSync.
//!
//! Sensitive values (API token, webhook URL) are stored as `_env` fields that
//! reference environment variable names. The actual secrets are resolved at
//! runtime via [`AppConfig::resolve_env_vars`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Daemon / polling settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Remote quote feed settings.
    pub remote: RemoteConfig,

    /// Notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Daemon / polling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between sync cycles (default 30).
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for persistent data (the SQLite store).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_sync_interval() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/quotesync")
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: default_sync_interval(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote feed
// ---------------------------------------------------------------------------

/// Remote quote feed connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Endpoint serving the quote feed (e.g. `https://quotes.example.com/api/quotes`).
    pub base_url: String,

    /// Per-request timeout in seconds (default 10). The fetch must time out
    /// before the reconciler is ever invoked.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Environment variable holding an optional bearer token.
    #[serde(default)]
    pub api_token_env: Option<String>,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub api_token: Option<String>,
}

fn default_timeout() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Notification channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NotificationConfig {
    /// Environment variable holding an incoming-webhook URL for conflict and
    /// failed-cycle notices.
    #[serde(default)]
    pub webhook_url_env: Option<String>,

    /// Resolved webhook URL.
    #[serde(skip)]
    pub webhook_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables and populate the
    /// corresponding resolved fields.
    ///
    /// Fields that reference a missing variable log a warning but do **not**
    /// fail -- both secrets here are optional.
    pub fn resolve_env_vars(&mut self) {
        if let Some(ref env_name) = self.remote.api_token_env {
            self.remote.api_token = resolve_optional_env(env_name, "remote.api_token_env");
        }
        if let Some(ref env_name) = self.notifications.webhook_url_env {
            self.notifications.webhook_url =
                resolve_optional_env(env_name, "notifications.webhook_url_env");
        }
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url".into(),
                detail: "remote endpoint URL must not be empty".into(),
            });
        }
        if !self.remote.base_url.starts_with("http://")
            && !self.remote.base_url.starts_with("https://")
        {
            return Err(ConfigError::InvalidValue {
                field: "remote.base_url".into(),
                detail: "remote endpoint URL must be http(s)".into(),
            });
        }
        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "remote.timeout_secs".into(),
                detail: "request timeout must be > 0".into(),
            });
        }
        if self.daemon.sync_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "daemon.sync_interval_secs".into(),
                detail: "sync interval must be > 0".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// A commented default configuration, used by `quotesync init`.
    pub fn default_toml() -> &'static str {
        r#"# QuoteSync configuration

[daemon]
# Seconds between sync cycles.
sync_interval_secs = 30
# Minimum log level: trace, debug, info, warn, error.
log_level = "info"
# Directory for the SQLite store.
data_dir = "/var/lib/quotesync"

[remote]
# Endpoint serving the remote quote feed.
base_url = "https://quotes.example.com/api/quotes"
# Per-request timeout in seconds.
timeout_secs = 10
# Optional: environment variable holding a bearer token.
# api_token_env = "QUOTESYNC_API_TOKEN"

[notifications]
# Optional: environment variable holding an incoming-webhook URL for
# conflict and failed-cycle notices.
# webhook_url_env = "QUOTESYNC_WEBHOOK_URL"
"#
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[daemon]
sync_interval_secs = 15
log_level = "debug"
data_dir = "/tmp/quotesync"

[remote]
base_url = "https://quotes.example.com/api/quotes"
timeout_secs = 5
api_token_env = "QUOTESYNC_API_TOKEN"

[notifications]
webhook_url_env = "QUOTESYNC_WEBHOOK_URL"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.daemon.sync_interval_secs, 15);
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.remote.base_url, "https://quotes.example.com/api/quotes");
        assert_eq!(config.remote.timeout_secs, 5);
        assert_eq!(
            config.remote.api_token_env.as_deref(),
            Some("QUOTESYNC_API_TOKEN")
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.daemon.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[remote]
base_url = "https://quotes.example.com/api/quotes"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.daemon.sync_interval_secs, 30);
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.remote.timeout_secs, 10);
        assert!(config.notifications.webhook_url_env.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.remote.base_url = String::new();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "remote.base_url"
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.remote.base_url = "ftp://quotes.example.com".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.daemon.sync_interval_secs = 0;
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "daemon.sync_interval_secs"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("TEST_QS_TOKEN", "tok_abc");

        let mut config: AppConfig = toml::from_str(
            r#"
[remote]
base_url = "https://quotes.example.com/api/quotes"
api_token_env = "TEST_QS_TOKEN"
"#,
        )
        .unwrap();
        config.resolve_env_vars();

        assert_eq!(config.remote.api_token.as_deref(), Some("tok_abc"));

        std::env::remove_var("TEST_QS_TOKEN");
    }

    #[test]
    fn test_default_toml_parses_and_validates() {
        let config: AppConfig = toml::from_str(AppConfig::default_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.daemon.sync_interval_secs, 30);
    }
}
