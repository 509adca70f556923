//! Typed accessors over the materialized configuration file.

use crate::core::ConfigFormat;
use crate::core::coerce::{parse_duration, parse_size_in_bytes, parse_time};
use crate::error::{ConfigError, Result, ValidationError};
use crate::notify::{ChangeOrigin, ConfigChange, SubscriberRegistry, SubscriptionHandle};
use crate::sources::content_md5;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use config::{Value, ValueKind};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Type alias for validator functions.
pub(crate) type Validator =
    Arc<dyn Fn(&config::Config) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Parsed view of the materialized file with lock-free typed reads.
///
/// The parsed document sits behind `arc-swap`, so reads never block a
/// concurrent [`reload`](ConfigStore::reload). Keys are dotted paths
/// (`server.port`), with `[n]` to index arrays (`servers[0].host`).
///
/// Every typed getter returns `None` when the key is missing or its value
/// cannot be converted. Use [`try_get`](ConfigStore::try_get) to tell the
/// two apart.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config::core::{ConfigFormat, ConfigStore};
///
/// # fn example() -> nacos_config::error::Result<()> {
/// let store = ConfigStore::load("/srv/app/application.yaml", ConfigFormat::Yaml)?;
///
/// let port = store.get_u32("server.port").unwrap_or(8080);
/// let timeout = store.get_duration("server.timeout");
/// # Ok(())
/// # }
/// ```
pub struct ConfigStore {
    /// The current document, wrapped in ArcSwap for atomic updates
    current: Arc<ArcSwap<config::Config>>,
    /// MD5 of the content behind `current`; also serializes reloads
    loaded_md5: Arc<Mutex<String>>,
    path: PathBuf,
    format: ConfigFormat,
    validator: Option<Validator>,
    subscribers: Arc<SubscriberRegistry>,
}

impl ConfigStore {
    /// Parse the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or cannot be parsed as `format`.
    pub fn load(path: impl Into<PathBuf>, format: ConfigFormat) -> Result<Self> {
        Self::with_validator(path, format, None)
    }

    /// Parse the file and check it with `validator`, which also guards every reload.
    pub(crate) fn with_validator(
        path: impl Into<PathBuf>,
        format: ConfigFormat,
        validator: Option<Validator>,
    ) -> Result<Self> {
        let path = path.into();
        let content = read_file(&path)?;
        let document = parse_content(&content, &path, format)?;

        if let Some(validator) = &validator {
            validator(&document)?;
        }

        Ok(Self {
            current: Arc::new(ArcSwap::new(Arc::new(document))),
            loaded_md5: Arc::new(Mutex::new(content_md5(&content))),
            path,
            format,
            validator,
            subscribers: Arc::new(SubscriberRegistry::new()),
        })
    }

    /// Re-read the file and atomically swap in the new document.
    ///
    /// Returns `false` when the file content is unchanged since the last
    /// load. If parsing or validation fails, the old document is retained.
    /// Subscribers are notified after a successful swap.
    pub async fn reload(&self) -> Result<bool> {
        self.reload_from(ChangeOrigin::Manual).await
    }

    pub(crate) async fn reload_from(&self, origin: ChangeOrigin) -> Result<bool> {
        let mut loaded_md5 = self.loaded_md5.lock().await;

        let content = read_file(&self.path)?;
        let md5 = content_md5(&content);
        if md5 == *loaded_md5 {
            return Ok(false);
        }

        let document = parse_content(&content, &self.path, self.format)?;
        if let Some(validator) = &self.validator {
            validator(&document)?;
        }

        self.current.store(Arc::new(document));
        *loaded_md5 = md5;
        drop(loaded_md5);
        debug!(path = %self.path.display(), ?origin, "configuration reloaded");

        self.subscribers
            .notify_all(&ConfigChange {
                origin,
                path: self.path.clone(),
            })
            .await;
        Ok(true)
    }

    /// Subscribe to successful reloads. Drop the handle to unsubscribe.
    pub async fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.subscribers.subscribe(callback).await
    }

    /// Path of the file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format the file is parsed as.
    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// The current parsed document.
    pub fn snapshot(&self) -> Arc<config::Config> {
        self.current.load_full()
    }

    /// Get a value converted to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KeyNotFound`] when the key is absent and
    /// [`ConfigError::TypeMismatch`] when conversion fails.
    pub fn try_get<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.current.load().get::<T>(key).map_err(|e| match e {
            config::ConfigError::NotFound(_) => ConfigError::KeyNotFound(key.to_string()),
            other => ConfigError::TypeMismatch {
                key: key.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Deserialize the whole document into `T`.
    pub fn deserialize<T>(&self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        config::Config::clone(&self.snapshot())
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize configuration: {}", e)))
    }

    /// Whether the key holds a non-null value.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key)
            .is_some_and(|value| !matches!(value.kind, ValueKind::Nil))
    }

    /// Raw value under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.try_get(key).ok()
    }

    /// Value as a string. Numbers and booleans are formatted.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.try_get(key).ok()
    }

    /// Value as a boolean (`true`, `yes`, `on`, `1`, ...).
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.try_get(key).ok()
    }

    /// Value as `i32`; out-of-range numbers yield `None`.
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.try_get(key).ok()
    }

    /// Value as `i64`.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.try_get(key).ok()
    }

    /// Value as `u32`.
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.try_get(key).ok()
    }

    /// Value as `u64`.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.try_get(key).ok()
    }

    /// Value as `usize`.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_u64(key).and_then(|v| usize::try_from(v).ok())
    }

    /// Value as `f64`.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.try_get(key).ok()
    }

    /// Value as a UTC timestamp.
    pub fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get_string(key).as_deref().and_then(parse_time)
    }

    /// Value as a duration (`1h30m`, `250ms`; bare numbers are nanoseconds).
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get_string(key).as_deref().and_then(parse_duration)
    }

    /// Array of integers.
    pub fn get_int_slice(&self, key: &str) -> Option<Vec<i64>> {
        match self.get(key)?.kind {
            ValueKind::Array(items) => items.into_iter().map(|v| v.into_int().ok()).collect(),
            _ => None,
        }
    }

    /// Array of strings. A scalar string is split on whitespace.
    pub fn get_string_slice(&self, key: &str) -> Option<Vec<String>> {
        let value = self.get(key)?;
        match &value.kind {
            ValueKind::Array(items) => items
                .iter()
                .map(|v| v.clone().into_string().ok())
                .collect(),
            ValueKind::Nil | ValueKind::Table(_) => None,
            _ => Some(
                value
                    .clone()
                    .into_string()
                    .ok()?
                    .split_whitespace()
                    .map(String::from)
                    .collect(),
            ),
        }
    }

    /// Table under `key`.
    pub fn get_string_map(&self, key: &str) -> Option<HashMap<String, Value>> {
        self.try_get(key).ok()
    }

    /// Table under `key` with every value formatted as a string.
    pub fn get_string_map_string(&self, key: &str) -> Option<HashMap<String, String>> {
        self.try_get(key).ok()
    }

    /// Table of string lists. Scalar entries become one-element lists.
    pub fn get_string_map_string_slice(&self, key: &str) -> Option<HashMap<String, Vec<String>>> {
        self.get_string_map(key)?
            .into_iter()
            .map(|(name, value)| {
                let items = match &value.kind {
                    ValueKind::Array(items) => items
                        .iter()
                        .map(|v| v.clone().into_string().ok())
                        .collect::<Option<Vec<_>>>()?,
                    ValueKind::Nil => Vec::new(),
                    _ => vec![value.clone().into_string().ok()?],
                };
                Some((name, items))
            })
            .collect()
    }

    /// Byte size such as `10mb` (powers of 1024).
    pub fn get_size_in_bytes(&self, key: &str) -> Option<u64> {
        self.get_string(key).as_deref().and_then(parse_size_in_bytes)
    }

    /// Every top-level setting.
    pub fn all_settings(&self) -> HashMap<String, Value> {
        self.deserialize().unwrap_or_default()
    }
}

impl Clone for ConfigStore {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            loaded_md5: Arc::clone(&self.loaded_md5),
            path: self.path.clone(),
            format: self.format,
            validator: self.validator.clone(),
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        ConfigError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to read {}: {}", path.display(), e),
        ))
    })
}

fn parse_content(content: &str, path: &Path, format: ConfigFormat) -> Result<config::Config> {
    config::Config::builder()
        .add_source(config::File::from_str(content, format.file_format()))
        .build()
        .map_err(|e| ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), e)))
}
