//! In-process remote source.

use super::{RemoteSource, content_md5};
use crate::core::{ConfigFormat, ConfigKey};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;

/// A [`RemoteSource`] backed by an in-memory map.
///
/// Behaves like a Nacos server from the client's point of view: long polls
/// return as soon as a watched document changes. Useful for tests and for
/// running without a server.
///
/// # Examples
///
/// ```rust
/// use nacos_config::core::{ConfigFormat, ConfigKey};
/// use nacos_config::sources::{MemorySource, RemoteSource};
///
/// # async fn example() -> nacos_config::error::Result<()> {
/// let source = MemorySource::new();
/// let key = ConfigKey::new("dev", "orders", "DEFAULT_GROUP")?;
/// source.set(&key, r#"{"port": 8080}"#);
///
/// assert_eq!(source.fetch(&key).await?, r#"{"port": 8080}"#);
/// # Ok(())
/// # }
/// ```
pub struct MemorySource {
    documents: Mutex<HashMap<ConfigKey, String>>,
    version: watch::Sender<u64>,
    poll_timeout: Duration,
    failures: AtomicUsize,
}

impl MemorySource {
    /// Create an empty source whose long polls hold for one second.
    pub fn new() -> Self {
        Self::with_poll_timeout(Duration::from_secs(1))
    }

    /// Create an empty source with a custom long-poll hold time.
    pub fn with_poll_timeout(poll_timeout: Duration) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            documents: Mutex::new(HashMap::new()),
            version,
            poll_timeout,
            failures: AtomicUsize::new(0),
        }
    }

    /// Store a document and wake pending long polls.
    pub fn set(&self, key: &ConfigKey, content: impl Into<String>) {
        self.lock().insert(key.clone(), content.into());
        self.version.send_modify(|v| *v += 1);
    }

    /// Delete a document.
    pub fn remove(&self, key: &ConfigKey) {
        self.lock().remove(key);
        self.version.send_modify(|v| *v += 1);
    }

    /// Make the next `count` requests fail with a transport error.
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConfigKey, String>> {
        // A panic while holding the lock leaves the map itself intact
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected_failure(&self) -> Result<()> {
        let consumed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match consumed {
            Ok(_) => Err(ConfigError::RemoteError("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }

    fn changed(&self, key: &ConfigKey, md5: &str) -> bool {
        self.lock()
            .get(key)
            .is_some_and(|content| content_md5(content) != md5)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSource for MemorySource {
    async fn fetch(&self, key: &ConfigKey) -> Result<String> {
        self.injected_failure()?;
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                namespace_id: key.namespace_id().to_string(),
                data_id: key.data_id().to_string(),
                group: key.group().to_string(),
            })
    }

    async fn poll_changes(&self, key: &ConfigKey, md5: &str) -> Result<bool> {
        self.injected_failure()?;
        let mut version = self.version.subscribe();
        if self.changed(key, md5) {
            return Ok(true);
        }

        let _ = timeout(self.poll_timeout, version.changed()).await;
        Ok(self.changed(key, md5))
    }

    async fn publish(&self, key: &ConfigKey, content: &str, _format: ConfigFormat) -> Result<bool> {
        self.injected_failure()?;
        self.set(key, content);
        Ok(true)
    }

    fn name(&self) -> String {
        "memory".to_string()
    }
}
