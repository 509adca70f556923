//! Client settings loaded from environment variables.

use crate::core::{ConfigFormat, ConfigKey};
use crate::error::{ConfigError, Result};
use config::Environment;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix shared by every environment variable the client reads.
pub const ENV_PREFIX: &str = "NS_CONFIG";

/// Directory created under `$HOME` when no root directory is configured.
pub const DEFAULT_ROOT_DIR_NAME: &str = "ns-config";

const HIDDEN_CHANGE_LOG: &str = "hidden";

/// Connection and materialization settings for a [`NacosConfigClient`].
///
/// Every field maps to an `NS_CONFIG_*` environment variable, e.g.
/// `NS_CONFIG_SERVER_HOST=10.0.0.5` or `NS_CONFIG_LONG_POLL_TIMEOUT_MS=30000`.
///
/// # Examples
///
/// ```rust
/// use nacos_config::settings::ClientSettings;
/// use std::collections::HashMap;
///
/// let env = HashMap::from([
///     ("NS_CONFIG_SERVER_HOST".to_string(), "10.0.0.5,10.0.0.6:8849".to_string()),
/// ]);
/// let settings = ClientSettings::from_map(env).unwrap();
/// let servers = settings.servers().unwrap();
/// assert_eq!(servers[0].port, 8848);
/// assert_eq!(servers[1].port, 8849);
/// ```
///
/// [`NacosConfigClient`]: crate::core::NacosConfigClient
#[derive(Clone, Deserialize)]
pub struct ClientSettings {
    /// Comma separated `host` or `host:port` entries.
    #[serde(default)]
    pub server_host: String,
    /// Port used for hosts listed without one.
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Context path of the Nacos web application.
    #[serde(default = "default_context_path")]
    pub context_path: String,
    /// Timeout of ordinary requests.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long the server may hold a listener request open.
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,
    /// Initial delay before retrying a failed listener cycle.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Login user, requires `password`.
    #[serde(default)]
    pub username: Option<String>,
    /// Login password, requires `username`.
    #[serde(default)]
    pub password: Option<String>,
    /// Base URL (scheme, host, port) used for publishing.
    #[serde(default)]
    pub api_host: Option<String>,
    /// Root of the materialized file tree.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// `hidden` silences the local file change log.
    #[serde(default)]
    pub show_change_log: Option<String>,
    /// Namespace used by [`ClientSettings::config_key`].
    #[serde(default)]
    pub namespace_id: Option<String>,
    /// Data id used by [`ClientSettings::config_key`].
    #[serde(default)]
    pub data_id: Option<String>,
    /// Group used by [`ClientSettings::config_key`].
    #[serde(default)]
    pub group: Option<String>,
    /// Document format, defaults to json.
    #[serde(default)]
    pub format: Option<String>,
}

/// One Nacos server endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddr {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("scheme", &self.scheme)
            .field("context_path", &self.context_path)
            .field("timeout_ms", &self.timeout_ms)
            .field("long_poll_timeout_ms", &self.long_poll_timeout_ms)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("api_host", &self.api_host)
            .field("root_dir", &self.root_dir)
            .field("show_change_log", &self.show_change_log)
            .field("namespace_id", &self.namespace_id)
            .field("data_id", &self.data_id)
            .field("group", &self.group)
            .field("format", &self.format)
            .finish()
    }
}

fn default_server_port() -> u16 {
    8848
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_context_path() -> String {
    "/nacos".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_long_poll_timeout_ms() -> u64 {
    30000
}

fn default_retry_interval_ms() -> u64 {
    2000
}

impl ClientSettings {
    /// Settings for a single server host, everything else at defaults.
    pub fn new(server_host: impl Into<String>) -> Self {
        Self {
            server_host: server_host.into(),
            server_port: default_server_port(),
            scheme: default_scheme(),
            context_path: default_context_path(),
            timeout_ms: default_timeout_ms(),
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
            retry_interval_ms: default_retry_interval_ms(),
            username: None,
            password: None,
            api_host: None,
            root_dir: None,
            show_change_log: None,
            namespace_id: None,
            data_id: None,
            group: None,
            format: None,
        }
    }

    /// Load settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be converted or the result
    /// fails validation (e.g. `NS_CONFIG_SERVER_HOST` is unset).
    pub fn from_env() -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings from an explicit variable map instead of the process environment.
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self> {
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn load(env: Environment) -> Result<Self> {
        let settings: Self = config::Config::builder()
            .add_source(env)
            .build()
            .map_err(|e| {
                ConfigError::SettingsError(format!("Failed to read environment variables: {}", e))
            })?
            .try_deserialize()
            .map_err(|e| {
                ConfigError::SettingsError(format!("Failed to parse environment variables: {}", e))
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.server_host.trim().is_empty() {
            return Err(ConfigError::SettingsError(
                "server host cannot be empty".to_string(),
            ));
        }
        if self.timeout_ms == 0 || self.long_poll_timeout_ms == 0 {
            return Err(ConfigError::SettingsError(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        match (&self.username, &self.password) {
            (Some(_), None) | (None, Some(_)) => Err(ConfigError::SettingsError(
                "username and password must be set together".to_string(),
            )),
            _ => self.servers().map(|_| ()),
        }
    }

    /// Parse `server_host` into endpoints.
    pub fn servers(&self) -> Result<Vec<ServerAddr>> {
        let mut servers = Vec::new();
        for entry in self.server_host.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }

            let addr = match entry.rsplit_once(':') {
                Some((host, port)) => ServerAddr {
                    host: host.to_string(),
                    port: port.parse().map_err(|_| {
                        ConfigError::SettingsError(format!("Invalid port in server host: {}", entry))
                    })?,
                },
                None => ServerAddr {
                    host: entry.to_string(),
                    port: self.server_port,
                },
            };
            servers.push(addr);
        }

        if servers.is_empty() {
            return Err(ConfigError::SettingsError(
                "server host cannot be empty".to_string(),
            ));
        }
        Ok(servers)
    }

    /// Whether local file changes are logged.
    pub fn change_log_enabled(&self) -> bool {
        !self
            .show_change_log
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case(HIDDEN_CHANGE_LOG))
    }

    /// Root directory of the materialized tree, `$HOME/ns-config` by default.
    pub fn root_dir(&self) -> PathBuf {
        match &self.root_dir {
            Some(dir) => dir.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_default()
                .join(DEFAULT_ROOT_DIR_NAME),
        }
    }

    /// Document key taken from `NS_CONFIG_NAMESPACE_ID`, `NS_CONFIG_DATA_ID` and `NS_CONFIG_GROUP`.
    pub fn config_key(&self) -> Result<ConfigKey> {
        ConfigKey::new(
            self.namespace_id.clone().unwrap_or_default(),
            self.data_id.clone().unwrap_or_default(),
            self.group.clone().unwrap_or_default(),
        )
    }

    /// Document format taken from `NS_CONFIG_FORMAT`.
    pub fn config_format(&self) -> Result<ConfigFormat> {
        match &self.format {
            Some(format) => format.parse(),
            None => Ok(ConfigFormat::default()),
        }
    }

    /// Request timeout for ordinary requests.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Long-poll hold time requested from the server.
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_ms)
    }

    /// Initial listener retry delay.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = ClientSettings::from_map(vars(&[("NS_CONFIG_SERVER_HOST", "nacos.local")]))
            .unwrap();
        assert_eq!(settings.server_port, 8848);
        assert_eq!(settings.scheme, "http");
        assert_eq!(settings.context_path, "/nacos");
        assert_eq!(settings.timeout(), Duration::from_millis(5000));
        assert_eq!(settings.long_poll_timeout(), Duration::from_secs(30));
        assert!(settings.change_log_enabled());
        assert_eq!(settings.config_format().unwrap(), ConfigFormat::Json);
    }

    #[test]
    fn test_debug_redacts_password() {
        let settings = ClientSettings::from_map(vars(&[
            ("NS_CONFIG_SERVER_HOST", "nacos.local"),
            ("NS_CONFIG_USERNAME", "nacos"),
            ("NS_CONFIG_PASSWORD", "s3cr3t-value"),
        ]))
        .unwrap();

        let printed = format!("{:?}", settings);
        assert!(!printed.contains("s3cr3t-value"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("nacos.local"));
    }

    #[test]
    fn test_missing_server_host() {
        let err = ClientSettings::from_map(vars(&[("NS_CONFIG_DATA_ID", "app")])).unwrap_err();
        assert!(err.to_string().contains("server host cannot be empty"));
    }

    #[test]
    fn test_overrides() {
        let settings = ClientSettings::from_map(vars(&[
            ("NS_CONFIG_SERVER_HOST", "nacos.local"),
            ("NS_CONFIG_SERVER_PORT", "9848"),
            ("NS_CONFIG_TIMEOUT_MS", "1500"),
            ("NS_CONFIG_SHOW_CHANGE_LOG", "HIDDEN"),
            ("NS_CONFIG_ROOT_DIR", "/var/lib/app-config"),
            ("NS_CONFIG_FORMAT", "yaml"),
        ]))
        .unwrap();
        assert_eq!(settings.server_port, 9848);
        assert_eq!(settings.timeout_ms, 1500);
        assert!(!settings.change_log_enabled());
        assert_eq!(settings.root_dir(), PathBuf::from("/var/lib/app-config"));
        assert_eq!(settings.config_format().unwrap(), ConfigFormat::Yaml);
    }

    #[test]
    fn test_key_from_env() {
        let settings = ClientSettings::from_map(vars(&[
            ("NS_CONFIG_SERVER_HOST", "nacos.local"),
            ("NS_CONFIG_NAMESPACE_ID", "prod"),
            ("NS_CONFIG_DATA_ID", "orders"),
            ("NS_CONFIG_GROUP", "DEFAULT_GROUP"),
        ]))
        .unwrap();
        let key = settings.config_key().unwrap();
        assert_eq!(key.namespace_id(), "prod");
        assert_eq!(key.data_id(), "orders");
        assert_eq!(key.group(), "DEFAULT_GROUP");
    }

    #[test]
    fn test_key_from_env_incomplete() {
        let settings = ClientSettings::new("nacos.local");
        assert!(settings.config_key().is_err());
    }

    #[test]
    fn test_servers_parsing() {
        let mut settings = ClientSettings::new("a.local, b.local:9000 ,");
        settings.server_port = 8850;
        let servers = settings.servers().unwrap();
        assert_eq!(
            servers,
            vec![
                ServerAddr {
                    host: "a.local".to_string(),
                    port: 8850
                },
                ServerAddr {
                    host: "b.local".to_string(),
                    port: 9000
                },
            ]
        );
    }

    #[test]
    fn test_invalid_port() {
        let settings = ClientSettings::new("a.local:http");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_credentials_must_pair() {
        let mut settings = ClientSettings::new("a.local");
        settings.username = Some("nacos".to_string());
        assert!(settings.validate().is_err());

        settings.password = Some("secret".to_string());
        assert!(settings.validate().is_ok());
    }
}
