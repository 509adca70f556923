//! The running client: remote document, local file and accessor store tied together.

use crate::core::store::Validator;
use crate::core::{ConfigFormat, ConfigKey, ConfigStore, NacosConfigClientBuilder};
use crate::error::Result;
use crate::notify::{ChangeOrigin, ConfigChange, SubscriptionHandle};
use crate::settings::ClientSettings;
use crate::sources::listener::RemoteListener;
use crate::sources::{LocalFile, RemoteSource, content_md5};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(feature = "file-watch")]
use crate::notify::ConfigWatcher;
#[cfg(feature = "file-watch")]
use tokio::sync::mpsc;

/// Everything the builder resolved, ready to start a client.
pub(crate) struct ClientParts {
    pub(crate) key: ConfigKey,
    pub(crate) format: ConfigFormat,
    pub(crate) file: LocalFile,
    pub(crate) source: Arc<dyn RemoteSource>,
    pub(crate) retry_interval: Duration,
    pub(crate) change_log: bool,
    pub(crate) local_fallback: bool,
    pub(crate) file_watch: bool,
    pub(crate) debounce: Duration,
    pub(crate) validator: Option<Validator>,
}

/// Client that mirrors one remote document into a local file and serves
/// typed reads from it.
///
/// Once built, a background task long-polls the remote service and rewrites
/// the local file whenever the document changes; the accessor store is
/// reloaded right after. With the `file-watch` feature the file is also
/// watched, so edits made by other processes are picked up too.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config::prelude::*;
///
/// # async fn example() -> nacos_config::error::Result<()> {
/// let client = NacosConfigClient::builder()
///     .namespace_id("5e49d8ed-c51a-4d59-9b48-4a71b70f65ac")
///     .data_id("orders-service")
///     .group("DEFAULT_GROUP")
///     .format(ConfigFormat::Yaml)
///     .settings(ClientSettings::new("10.0.0.5"))
///     .build()
///     .await?;
///
/// let name = client.config().get_string("service.name");
/// let timeout = client.config().get_duration("service.timeout");
/// # Ok(())
/// # }
/// ```
pub struct NacosConfigClient {
    key: ConfigKey,
    format: ConfigFormat,
    file: LocalFile,
    store: ConfigStore,
    source: Arc<dyn RemoteSource>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    #[cfg(feature = "file-watch")]
    watcher: Option<ConfigWatcher>,
}

impl NacosConfigClient {
    /// Create a new builder for constructing a client.
    pub fn builder() -> NacosConfigClientBuilder {
        NacosConfigClientBuilder::new()
    }

    /// Build a client entirely from `NS_CONFIG_*` environment variables.
    ///
    /// `NS_CONFIG_SERVER_HOST`, `NS_CONFIG_NAMESPACE_ID`, `NS_CONFIG_DATA_ID`
    /// and `NS_CONFIG_GROUP` are required.
    pub async fn from_env() -> Result<Self> {
        Self::builder()
            .settings(ClientSettings::from_env()?)
            .build()
            .await
    }

    /// Run the startup sequence: fetch, materialize, parse, then spawn watchers.
    pub(crate) async fn start(parts: ClientParts) -> Result<Self> {
        let ClientParts {
            key,
            format,
            file,
            source,
            retry_interval,
            change_log,
            local_fallback,
            file_watch,
            debounce,
            validator,
        } = parts;

        file.ensure_dir()?;

        let content = match source.fetch(&key).await {
            Ok(content) => {
                file.write(&content)?;
                content
            }
            Err(e) if local_fallback && file.exists() => {
                warn!(key = %key, error = %e, path = %file.path().display(), "remote fetch failed, using local copy");
                file.read()?
            }
            Err(e) => return Err(e),
        };
        info!(key = %key, path = %file.path().display(), "config materialized");

        let store = ConfigStore::with_validator(file.path(), format, validator)?;
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut tasks = vec![
            RemoteListener {
                source: Arc::clone(&source),
                key: key.clone(),
                file: file.clone(),
                store: store.clone(),
                last_md5: content_md5(&content),
                retry_interval,
            }
            .spawn(shutdown_rx.clone()),
        ];

        #[cfg(feature = "file-watch")]
        let watcher = if file_watch {
            let (watcher, signals) = ConfigWatcher::watch_file(file.path(), debounce)?;
            tasks.push(spawn_file_reloader(
                store.clone(),
                signals,
                shutdown_rx,
                change_log,
            ));
            Some(watcher)
        } else {
            None
        };

        #[cfg(not(feature = "file-watch"))]
        let _ = (file_watch, debounce, change_log, shutdown_rx, &mut tasks);

        Ok(Self {
            key,
            format,
            file,
            store,
            source,
            shutdown,
            tasks,
            #[cfg(feature = "file-watch")]
            watcher,
        })
    }

    /// Typed accessors over the materialized document.
    pub fn config(&self) -> &ConfigStore {
        &self.store
    }

    /// The document this client mirrors.
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    /// Format of the document.
    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Path of the materialized file.
    pub fn local_path(&self) -> &Path {
        self.file.path()
    }

    /// Name of the remote source, for diagnostics.
    pub fn source_name(&self) -> String {
        self.source.name()
    }

    /// Whether the materialized file is watched on disk.
    pub fn is_watching(&self) -> bool {
        #[cfg(feature = "file-watch")]
        {
            self.watcher.is_some()
        }

        #[cfg(not(feature = "file-watch"))]
        {
            false
        }
    }

    /// Subscribe to reloads of the accessor store.
    pub async fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        self.store.subscribe(callback).await
    }

    /// Publish new content for this document to the remote service.
    ///
    /// Returns the server's verdict. The local copy is updated by the
    /// listener once the server announces the change.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use nacos_config::prelude::*;
    /// # async fn example(client: NacosConfigClient) -> nacos_config::error::Result<()> {
    /// let accepted = client.publish(r#"{"service": {"name": "orders"}}"#).await?;
    /// assert!(accepted);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn publish(&self, content: &str) -> Result<bool> {
        info!(key = %self.key, bytes = content.len(), "publishing config");
        self.source.publish(&self.key, content, self.format).await
    }

    /// Fetch the document now instead of waiting for the listener.
    ///
    /// Returns `true` when a new document was swapped into the store.
    pub async fn refresh(&self) -> Result<bool> {
        let content = self.source.fetch(&self.key).await?;
        if self.file.exists() && content_md5(&self.file.read()?) == content_md5(&content) {
            return Ok(false);
        }

        self.file.write(&content)?;
        self.store.reload_from(ChangeOrigin::Manual).await
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        for task in std::mem::take(&mut self.tasks) {
            let _ = task.await;
        }
        debug!(key = %self.key, "client stopped");
    }
}

/// Reload the store whenever the watcher reports a change on disk.
#[cfg(feature = "file-watch")]
fn spawn_file_reloader(
    store: ConfigStore,
    mut signals: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
    change_log: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                signal = signals.recv() => {
                    if signal.is_none() {
                        break;
                    }
                    match store.reload_from(ChangeOrigin::LocalFile).await {
                        Ok(true) if change_log => {
                            info!(path = %store.path().display(), "config file changed");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(path = %store.path().display(), error = %e, "config file change rejected");
                        }
                    }
                }
            }
        }
    })
}

impl Drop for NacosConfigClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for NacosConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NacosConfigClient")
            .field("key", &self.key)
            .field("format", &self.format)
            .field("local_path", &self.file.path())
            .field("source", &self.source.name())
            .finish()
    }
}
