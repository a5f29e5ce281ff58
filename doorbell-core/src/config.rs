//! Configuration management for doorbell
//!
//! Config files are stored in platform-appropriate locations:
//! - Linux: ~/.config/doorbell/
//! - macOS: ~/Library/Application Support/doorbell/
//! - Windows: %APPDATA%\doorbell\
//!
//! `ROUTER_IP` and `ROUTER_PASS` in the environment override the file.
//! Configuration is read and validated once at startup.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Environment variable overriding `router.host`
pub const ENV_ROUTER_HOST: &str = "ROUTER_IP";
/// Environment variable overriding `router.password`
pub const ENV_ROUTER_PASSWORD: &str = "ROUTER_PASS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Config directory not found")]
    NoDirFound,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Router connection settings
    #[serde(default)]
    pub router: RouterConfig,

    /// Polling daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Registered devices and their owners
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

/// Router admin password. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct RouterPassword(String);

impl RouterPassword {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for RouterPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RouterPassword(***)")
    }
}

/// Router connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    /// Router address, e.g. `192.168.31.1`
    #[serde(default)]
    pub host: String,

    /// Admin password for the web interface
    #[serde(default)]
    pub password: RouterPassword,

    /// Timeout for each request to the router, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long a session token is reused, in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// Log in again once when the router rejects a cached token
    #[serde(default)]
    pub reauth_on_rejection: bool,
}

/// Polling daemon settings
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Seconds between presence polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

/// A registered device
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Hardware address as the owner wrote it
    pub mac: String,

    /// Who the device belongs to
    pub owner: String,
}

fn default_request_timeout() -> u64 {
    crate::DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_token_ttl() -> u64 {
    crate::DEFAULT_TOKEN_TTL_SECS
}
fn default_poll_interval() -> u64 {
    crate::DEFAULT_POLL_INTERVAL_SECS
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            password: RouterPassword::default(),
            request_timeout_secs: default_request_timeout(),
            token_ttl_secs: default_token_ttl(),
            reauth_on_rejection: false,
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl RouterConfig {
    /// Base URL of the router's LuCI web interface
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            format!("{}/cgi-bin/luci", host)
        } else {
            format!("http://{}/cgi-bin/luci", host)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl DaemonConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("doorbell"))
            .ok_or(ConfigError::NoDirFound)
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from default location
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load config from specific path
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Apply `ROUTER_IP` / `ROUTER_PASS` from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_ROUTER_HOST).filter(|v| !v.is_empty()) {
            self.router.host = host;
        }
        if let Some(password) = lookup(ENV_ROUTER_PASSWORD).filter(|v| !v.is_empty()) {
            self.router.password = RouterPassword::new(password);
        }
    }

    /// Check everything the presence core needs before it is built
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.router.host.trim().is_empty() {
            return Err(ConfigError::Missing("router.host"));
        }
        if self.router.password.is_empty() {
            return Err(ConfigError::Missing("router.password"));
        }
        if self.router.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "router.request_timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.daemon.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "daemon.poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.router.token_ttl_secs, crate::DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.router.request_timeout_secs, crate::DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(!config.router.reauth_on_rejection);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(
            r#"
            [router]
            host = "192.168.31.1"
            password = "hunter2"
            request_timeout_secs = 3
            reauth_on_rejection = true

            [daemon]
            poll_interval_secs = 15

            [[devices]]
            mac = "aa:bb:cc:dd:ee:ff"
            owner = "alice"
            "#,
        )
        .unwrap();

        assert_eq!(config.router.host, "192.168.31.1");
        assert_eq!(config.router.password.expose(), "hunter2");
        assert_eq!(config.router.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.router.token_ttl_secs, 300);
        assert!(config.router.reauth_on_rejection);
        assert_eq!(config.daemon.poll_interval(), Duration::from_secs(15));
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].owner, "alice");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[router]\nhost = \"10.0.0.1\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.router.host, "10.0.0.1");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("router.password"))
        ));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = Config::default();
        config.router.host = "10.0.0.1".to_string();

        config.apply_overrides(env(&[
            (ENV_ROUTER_HOST, "192.168.31.1"),
            (ENV_ROUTER_PASSWORD, "secret"),
        ]));

        assert_eq!(config.router.host, "192.168.31.1");
        assert_eq!(config.router.password.expose(), "secret");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = Config::default();
        config.router.host = "10.0.0.1".to_string();
        config.apply_overrides(env(&[(ENV_ROUTER_HOST, "")]));
        assert_eq!(config.router.host, "10.0.0.1");
    }

    #[test]
    fn test_missing_host_is_fatal() {
        let mut config = Config::default();
        config.apply_overrides(env(&[(ENV_ROUTER_PASSWORD, "secret")]));
        assert!(matches!(config.validate(), Err(ConfigError::Missing("router.host"))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.apply_overrides(env(&[(ENV_ROUTER_HOST, "r"), (ENV_ROUTER_PASSWORD, "p")]));
        config.router.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_base_url() {
        let mut router = RouterConfig::default();
        router.host = "192.168.31.1".to_string();
        assert_eq!(router.base_url(), "http://192.168.31.1/cgi-bin/luci");

        router.host = "http://router.lan/".to_string();
        assert_eq!(router.base_url(), "http://router.lan/cgi-bin/luci");
    }

    #[test]
    fn test_password_not_printed() {
        let password = RouterPassword::new("hunter2");
        assert!(!format!("{:?}", password).contains("hunter2"));
    }
}
