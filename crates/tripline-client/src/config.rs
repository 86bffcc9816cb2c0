//! # Client Configuration
//!
//! Configuration management for the collector client.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Command-line flags (highest priority, applied by the CLI)           │
//! │                                                                         │
//! │  2. Environment Variables                                               │
//! │     TRIPLINE_SERVER=10.0.0.5:5000                                       │
//! │     TRIPLINE_REPORT_INTERVAL_MS=1000                                    │
//! │                                                                         │
//! │  3. TOML Config File                                                    │
//! │     ~/.config/tripline/client.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tripline.tripline/client.toml     │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                    │
//! │     54.208.56.133:5000, 1 second cadence, 10 second request timeout     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [collector]
//! server = "54.208.56.133:5000"
//! request_timeout_secs = 10
//! connect_timeout_secs = 5
//! use_proxy = false
//!
//! [reporting]
//! interval_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use tripline_core::ServerAddress;

use crate::error::{ClientError, ClientResult};

// =============================================================================
// Collector Settings
// =============================================================================

/// Where the collector lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorSettings {
    /// `host:port` of the collector.
    #[serde(default)]
    pub server: ServerAddress,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    #[serde(default)]
    pub use_proxy: bool,
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

impl Default for CollectorSettings {
    fn default() -> Self {
        CollectorSettings {
            server: ServerAddress::default(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            use_proxy: false,
        }
    }
}

// =============================================================================
// Reporting Settings
// =============================================================================

/// Cadence of the location push loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingSettings {
    /// Time between two ticks (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

impl Default for ReportingSettings {
    fn default() -> Self {
        ReportingSettings {
            interval_ms: default_interval_ms(),
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Collector endpoint settings.
    #[serde(default)]
    pub collector: CollectorSettings,

    /// Reporting loop settings.
    #[serde(default)]
    pub reporting: ReportingSettings,
}

impl ClientConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a default config pointing at `server`.
    pub fn with_server(server: ServerAddress) -> Self {
        let mut config = Self::default();
        config.collector.server = server;
        config
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if self.reporting.interval_ms == 0 {
            return Err(ClientError::InvalidConfig(
                "reporting.interval_ms must be greater than 0".into(),
            ));
        }

        if self.collector.request_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "collector.request_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.collector.connect_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "collector.connect_timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) -> ClientResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies `TRIPLINE_*` overrides read through `lookup`.
    ///
    /// A malformed server address is an error; malformed numbers are logged
    /// and ignored.
    fn apply_overrides_from<F>(&mut self, lookup: F) -> ClientResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup("TRIPLINE_SERVER") {
            debug!(server = %server, "Overriding collector address from environment");
            self.collector.server = server
                .parse()
                .map_err(|e: tripline_core::CoreError| ClientError::InvalidAddress(e.to_string()))?;
        }

        override_number(&lookup, "TRIPLINE_REPORT_INTERVAL_MS", &mut self.reporting.interval_ms);
        override_number(
            &lookup,
            "TRIPLINE_REQUEST_TIMEOUT_SECS",
            &mut self.collector.request_timeout_secs,
        );
        override_number(
            &lookup,
            "TRIPLINE_CONNECT_TIMEOUT_SECS",
            &mut self.collector.connect_timeout_secs,
        );

        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tripline", "tripline")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the collector address.
    pub fn server(&self) -> &ServerAddress {
        &self.collector.server
    }

    /// Returns the reporting cadence.
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.reporting.interval_ms)
    }

    /// Returns the whole-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.request_timeout_secs)
    }

    /// Returns the TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.connect_timeout_secs)
    }
}

fn override_number<F>(lookup: &F, key: &str, target: &mut u64)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(key) {
        match value.trim().parse::<u64>() {
            Ok(number) => *target = number,
            Err(_) => warn!(key, value = %value, "Ignoring invalid environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tripline-config-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server().to_string(), "54.208.56.133:5000");
        assert_eq!(config.report_interval(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(!config.collector.use_proxy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();
        config.reporting.interval_ms = 0;
        assert!(config.validate().is_err());

        config.reporting.interval_ms = 250;
        config.collector.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.collector.request_timeout_secs = 3;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [collector]
            server = "10.0.0.5:8080"
            "#,
        )
        .unwrap();

        assert_eq!(config.server().host(), "10.0.0.5");
        assert_eq!(config.server().port(), 8080);
        assert_eq!(config.reporting.interval_ms, 1000);
        assert_eq!(config.collector.connect_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_server_in_toml_is_rejected() {
        let result = toml::from_str::<ClientConfig>(
            r#"
            [collector]
            server = "http://10.0.0.5"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = ClientConfig::with_server("127.0.0.1:5000".parse().unwrap());
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[collector]"));
        assert!(toml_str.contains("[reporting]"));
        assert!(toml_str.contains("server = \"127.0.0.1:5000\""));
    }

    #[test]
    fn test_new_matches_default() {
        assert_eq!(ClientConfig::new(), ClientConfig::default());
        assert_eq!(ClientConfig::new().connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_env_overrides_apply() {
        let mut config = ClientConfig::default();
        config
            .apply_overrides_from(vars(&[
                ("TRIPLINE_SERVER", "10.9.8.7:6000"),
                ("TRIPLINE_REPORT_INTERVAL_MS", "250"),
                ("TRIPLINE_REQUEST_TIMEOUT_SECS", "3"),
                ("TRIPLINE_CONNECT_TIMEOUT_SECS", " 2 "),
            ]))
            .unwrap();

        assert_eq!(config.server().to_string(), "10.9.8.7:6000");
        assert_eq!(config.reporting.interval_ms, 250);
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_env_override_with_bad_server_fails() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_overrides_from(vars(&[("TRIPLINE_SERVER", "http://10.9.8.7")]))
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidAddress(_)));
        assert!(err.is_config_error());
        assert_eq!(config.server(), &ServerAddress::default());
    }

    #[test]
    fn test_env_override_bad_numbers_are_ignored() {
        let mut config = ClientConfig::default();
        config
            .apply_overrides_from(vars(&[
                ("TRIPLINE_REPORT_INTERVAL_MS", "fast"),
                ("TRIPLINE_REQUEST_TIMEOUT_SECS", "-1"),
                ("TRIPLINE_CONNECT_TIMEOUT_SECS", ""),
            ]))
            .unwrap();

        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_no_env_leaves_config_untouched() {
        let mut config = ClientConfig::with_server("127.0.0.1:5000".parse().unwrap());
        config.apply_overrides_from(|_| None).unwrap();
        assert_eq!(
            config,
            ClientConfig::with_server("127.0.0.1:5000".parse().unwrap())
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = temp_path("save");
        let path = dir.join("nested").join("client.toml");

        let mut config = ClientConfig::with_server("10.0.0.9:7000".parse().unwrap());
        config.reporting.interval_ms = 400;
        config.collector.use_proxy = true;
        config.save(Some(path.clone())).unwrap();

        let loaded = ClientConfig::load(Some(path)).unwrap();
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_or_default_falls_back_on_bad_file() {
        let path = temp_path("broken.toml");
        std::fs::write(&path, "[reporting\ninterval_ms = ").unwrap();

        assert!(ClientConfig::load(Some(path.clone())).is_err());
        assert_eq!(
            ClientConfig::load_or_default(Some(path.clone())),
            ClientConfig::default()
        );

        std::fs::write(&path, "[reporting]\ninterval_ms = 0\n").unwrap();
        assert_eq!(
            ClientConfig::load_or_default(Some(path.clone())),
            ClientConfig::default()
        );

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_from_explicit_path() {
        let path = temp_path("load.toml");
        std::fs::write(&path, "[reporting]\ninterval_ms = 250\n").unwrap();

        let config = ClientConfig::load(Some(path.clone())).unwrap();
        assert_eq!(config.reporting.interval_ms, 250);

        std::fs::remove_file(&path).ok();
    }
}
