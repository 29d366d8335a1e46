//! Configuration file parsing and structures.
//!
//! hubspaced uses TOML for declarative configuration. Each integration gets a
//! statically typed section under `[integrations]`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `hubspace = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter: the global level plus every override.
    pub fn filter(&self) -> Targets {
        Targets::new()
            .with_default(LevelFilter::from(self.level))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

fn default_true() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_listen(),
            port: default_port(),
        }
    }
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default)]
    pub hubspace: Option<HubspaceConfig>,
}

fn default_poll_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}

fn default_token_lifetime() -> u64 {
    118
}

/// HubSpace cloud integration configuration
#[derive(Clone, Deserialize)]
pub struct HubspaceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub username: String,

    pub password: String,

    /// Seconds between polls of the device listing
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds an access token is reused before refreshing
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,

    /// Override for the Keycloak realm URL
    #[serde(default)]
    pub auth_url: Option<String>,

    /// Override for the device API root
    #[serde(default)]
    pub api_url: Option<String>,
}

impl fmt::Debug for HubspaceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubspaceConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("token_lifetime_secs", &self.token_lifetime_secs)
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl HubspaceConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn credentials(&self) -> hubspace::Credentials {
        hubspace::Credentials::new(self.username.clone(), self.password.clone())
    }

    pub fn client_options(&self) -> hubspace::ClientOptions {
        let mut endpoints = hubspace::Endpoints::default();
        if let Some(url) = &self.auth_url {
            endpoints.auth_base = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &self.api_url {
            endpoints.api_base = url.trim_end_matches('/').to_string();
        }

        hubspace::ClientOptions {
            endpoints,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            token_lifetime: Duration::from_secs(self.token_lifetime_secs),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        contents.parse()
    }

    /// Check constraints that the TOML schema can't express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cfg) = &self.integrations.hubspace {
            if cfg.username.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "integrations.hubspace.username must not be empty".to_string(),
                ));
            }
            if cfg.poll_interval_secs == 0 {
                return Err(ConfigError::Invalid(
                    "integrations.hubspace.poll_interval_secs must be at least 1".to_string(),
                ));
            }
            if cfg.request_timeout_secs == 0 {
                return Err(ConfigError::Invalid(
                    "integrations.hubspace.request_timeout_secs must be at least 1".to_string(),
                ));
            }
            if cfg.token_lifetime_secs == 0 {
                return Err(ConfigError::Invalid(
                    "integrations.hubspace.token_lifetime_secs must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: Config = "".parse().unwrap();
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.api.enabled);
        assert_eq!(config.api.port, 8565);
        assert!(config.integrations.hubspace.is_none());
    }

    #[test]
    fn test_parse_hubspace_integration() {
        let toml = r#"
            [logging]
            level = "debug"

            [logging.overrides]
            hubspace = "trace"

            [api]
            listen = "0.0.0.0"
            port = 9000

            [integrations.hubspace]
            username = "me@example.com"
            password = "secret"
            poll_interval_secs = 30
        "#;

        let config: Config = toml.parse().unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.overrides["hubspace"], LogLevel::Trace);
        assert_eq!(config.api.listen, "0.0.0.0");

        let cfg = config.integrations.hubspace.as_ref().unwrap();
        assert!(cfg.enabled);
        assert_eq!(cfg.username, "me@example.com");
        assert_eq!(cfg.poll_interval(), Duration::from_secs(30));
        assert_eq!(cfg.request_timeout_secs, 10);
        assert_eq!(cfg.token_lifetime_secs, 118);

        let options = cfg.client_options();
        assert_eq!(options.endpoints, hubspace::Endpoints::default());
        assert_eq!(options.token_lifetime, Duration::from_secs(118));
    }

    #[test]
    fn test_endpoint_overrides() {
        let toml = r#"
            [integrations.hubspace]
            username = "me"
            password = "pw"
            auth_url = "http://localhost:8080/auth/realms/thd/"
            api_url = "http://localhost:8081/v1"
        "#;

        let config: Config = toml.parse().unwrap();
        let options = config.integrations.hubspace.unwrap().client_options();
        assert_eq!(options.endpoints.auth_base, "http://localhost:8080/auth/realms/thd");
        assert_eq!(options.endpoints.api_base, "http://localhost:8081/v1");
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let toml = r#"
            [integrations.hubspace]
            username = "me"
            password = "pw"
            poll_interval_secs = 0
        "#;

        let err = toml.parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_token_lifetime_rejected() {
        let toml = r#"
            [integrations.hubspace]
            username = "me"
            password = "pw"
            token_lifetime_secs = 0
        "#;

        let err = toml.parse::<Config>().unwrap_err();
        assert!(
            matches!(&err, ConfigError::Invalid(msg) if msg.contains("token_lifetime_secs")),
            "unexpected error: {}",
            err
        );
    }

    #[test]
    fn test_missing_password_is_parse_error() {
        let toml = r#"
            [integrations.hubspace]
            username = "me"
        "#;

        let err = toml.parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let toml = r#"
            [integrations.hubspace]
            username = "me"
            password = "hunter2"
        "#;

        let config: Config = toml.parse().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hubspaced.toml");
        std::fs::write(
            &path,
            "[integrations.hubspace]\nusername = \"me\"\npassword = \"pw\"\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.integrations.hubspace.is_some());

        let missing = Config::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(..)));
    }
}
