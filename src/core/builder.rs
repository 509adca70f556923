//! Builder for constructing NacosConfigClient instances.

use crate::core::client::ClientParts;
use crate::core::store::Validator;
use crate::core::{ConfigFormat, ConfigKey, NacosConfigClient};
use crate::error::{Result, ValidationError};
use crate::settings::ClientSettings;
use crate::sources::{LocalFile, NacosSource, RemoteSource};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default quiet period before a burst of file events triggers a reload.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Builder for constructing a [`NacosConfigClient`].
///
/// Fields left unset fall back to the [`ClientSettings`]: the document key
/// and format come from `NS_CONFIG_NAMESPACE_ID`, `NS_CONFIG_DATA_ID`,
/// `NS_CONFIG_GROUP` and `NS_CONFIG_FORMAT`. When neither settings nor a
/// custom source are given, settings are read from the environment.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config::prelude::*;
///
/// # async fn example() -> nacos_config::error::Result<()> {
/// let client = NacosConfigClient::builder()
///     .namespace_id("prod")
///     .data_id("orders-service")
///     .group("DEFAULT_GROUP")
///     .format_name("yaml")
///     .local_fallback(true)
///     .with_validation(|doc: &config::Config| {
///         if doc.get::<u16>("server.port").is_err() {
///             return Err(ValidationError::invalid_field("server.port", "missing"));
///         }
///         Ok(())
///     })
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct NacosConfigClientBuilder {
    namespace_id: Option<String>,
    data_id: Option<String>,
    group: Option<String>,
    format: Option<ConfigFormat>,
    format_name: Option<String>,
    settings: Option<ClientSettings>,
    root_dir: Option<PathBuf>,
    source: Option<Arc<dyn RemoteSource>>,
    local_fallback: bool,
    file_watch: bool,
    debounce: Duration,
    validator: Option<Validator>,
}

impl NacosConfigClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            namespace_id: None,
            data_id: None,
            group: None,
            format: None,
            format_name: None,
            settings: None,
            root_dir: None,
            source: None,
            local_fallback: false,
            file_watch: cfg!(feature = "file-watch"),
            debounce: DEFAULT_DEBOUNCE,
            validator: None,
        }
    }

    /// Namespace (Nacos tenant) of the document.
    pub fn namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.namespace_id = Some(namespace_id.into());
        self
    }

    /// Data id of the document.
    pub fn data_id(mut self, data_id: impl Into<String>) -> Self {
        self.data_id = Some(data_id.into());
        self
    }

    /// Group of the document.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Format of the document.
    pub fn format(mut self, format: ConfigFormat) -> Self {
        self.format = Some(format);
        self.format_name = None;
        self
    }

    /// Format by name (`json`, `yaml`, `yml`, `toml`), checked in [`build`](Self::build).
    pub fn format_name(mut self, name: impl Into<String>) -> Self {
        self.format_name = Some(name.into());
        self.format = None;
        self
    }

    /// Connection settings; defaults to [`ClientSettings::from_env`].
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Root of the materialized file tree, overriding the settings.
    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(root_dir.into());
        self
    }

    /// Use a custom remote source instead of a Nacos server.
    pub fn source<S: RemoteSource + 'static>(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Use a shared custom remote source.
    pub fn shared_source(mut self, source: Arc<dyn RemoteSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Start from the existing local file when the initial fetch fails.
    pub fn local_fallback(mut self, enabled: bool) -> Self {
        self.local_fallback = enabled;
        self
    }

    /// Watch the materialized file on disk (on by default with `file-watch`).
    pub fn file_watch(mut self, enabled: bool) -> Self {
        self.file_watch = enabled;
        self
    }

    /// Quiet period before file events trigger a reload.
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Add a validation function every document must pass before it is served.
    ///
    /// A failing initial document aborts [`build`](Self::build); a failing
    /// update is rejected and the previous document keeps being served.
    pub fn with_validation<F>(mut self, validator: F) -> Self
    where
        F: Fn(&config::Config) -> std::result::Result<(), ValidationError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Validate the inputs, fetch and materialize the document, and start watching.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key is incomplete or the format unsupported
    /// - Settings are missing or invalid
    /// - The initial fetch fails (and no local fallback applies)
    /// - The document cannot be written, parsed or validated
    pub async fn build(self) -> Result<NacosConfigClient> {
        let settings = match (self.settings, &self.source) {
            (Some(settings), _) => settings,
            (None, None) => ClientSettings::from_env()?,
            // Only used for local paths and timing with a custom source
            (None, Some(_)) => ClientSettings::new(String::new()),
        };

        let key = ConfigKey::new(
            self.namespace_id
                .or_else(|| settings.namespace_id.clone())
                .unwrap_or_default(),
            self.data_id
                .or_else(|| settings.data_id.clone())
                .unwrap_or_default(),
            self.group
                .or_else(|| settings.group.clone())
                .unwrap_or_default(),
        )?;

        let format = match (self.format, self.format_name) {
            (Some(format), _) => format,
            (None, Some(name)) => name.parse()?,
            (None, None) => settings.config_format()?,
        };

        let source: Arc<dyn RemoteSource> = match self.source {
            Some(source) => source,
            None => Arc::new(NacosSource::from_settings(&settings)?),
        };

        let root_dir = self.root_dir.unwrap_or_else(|| settings.root_dir());
        let file = LocalFile::new(root_dir, &key, format);

        NacosConfigClient::start(ClientParts {
            key,
            format,
            file,
            source,
            retry_interval: settings.retry_interval(),
            change_log: settings.change_log_enabled(),
            local_fallback: self.local_fallback,
            file_watch: self.file_watch,
            debounce: self.debounce,
            validator: self.validator,
        })
        .await
    }
}

impl Default for NacosConfigClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::sources::MemorySource;
    use tempfile::TempDir;

    #[test]
    fn test_builder_defaults() {
        let builder = NacosConfigClientBuilder::new();
        assert!(!builder.local_fallback);
        assert_eq!(builder.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(builder.file_watch, cfg!(feature = "file-watch"));
    }

    #[test]
    fn test_format_setters_override_each_other() {
        let builder = NacosConfigClientBuilder::new()
            .format_name("yaml")
            .format(ConfigFormat::Toml);
        assert_eq!(builder.format, Some(ConfigFormat::Toml));
        assert!(builder.format_name.is_none());
    }

    #[tokio::test]
    async fn test_build_rejects_empty_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let err = NacosConfigClientBuilder::new()
            .data_id("orders")
            .group("DEFAULT_GROUP")
            .root_dir(temp_dir.path())
            .source(MemorySource::new())
            .build()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("namespace id cannot be empty"));
    }

    #[tokio::test]
    async fn test_build_rejects_unknown_format() {
        let temp_dir = TempDir::new().unwrap();
        let err = NacosConfigClientBuilder::new()
            .namespace_id("dev")
            .data_id("orders")
            .group("DEFAULT_GROUP")
            .format_name("xml")
            .root_dir(temp_dir.path())
            .source(MemorySource::new())
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_build_requires_server_host_without_source() {
        let err = NacosConfigClientBuilder::new()
            .namespace_id("dev")
            .data_id("orders")
            .group("DEFAULT_GROUP")
            .settings(ClientSettings::new(""))
            .build()
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::SettingsError(_)));
    }

    #[tokio::test]
    async fn test_key_taken_from_settings() {
        let temp_dir = TempDir::new().unwrap();
        let mut settings = ClientSettings::new("unused.local");
        settings.namespace_id = Some("dev".to_string());
        settings.data_id = Some("orders".to_string());
        settings.group = Some("DEFAULT_GROUP".to_string());
        settings.format = Some("yaml".to_string());

        let source = MemorySource::new();
        let key = ConfigKey::new("dev", "orders", "DEFAULT_GROUP").unwrap();
        source.set(&key, "port: 8080\n");

        let client = NacosConfigClientBuilder::new()
            .settings(settings)
            .root_dir(temp_dir.path())
            .source(source)
            .file_watch(false)
            .build()
            .await
            .unwrap();

        assert_eq!(client.key(), &key);
        assert_eq!(client.format(), ConfigFormat::Yaml);
        assert_eq!(client.config().get_u32("port"), Some(8080));
    }
}
