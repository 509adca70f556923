//! Background task keeping the materialized file in sync with the remote document.

use super::{LocalFile, RemoteSource, content_md5};
use crate::core::{ConfigKey, ConfigStore};
use crate::error::Result;
use crate::notify::ChangeOrigin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Upper bound for the retry delay after repeated failures.
pub const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// State of the remote listener loop.
pub(crate) struct RemoteListener {
    pub(crate) source: Arc<dyn RemoteSource>,
    pub(crate) key: ConfigKey,
    pub(crate) file: LocalFile,
    pub(crate) store: ConfigStore,
    pub(crate) last_md5: String,
    pub(crate) retry_interval: Duration,
}

impl RemoteListener {
    /// Run the loop on the tokio runtime until `shutdown` fires or its sender is dropped.
    pub(crate) fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        debug!(key = %self.key, source = %self.source.name(), "remote listener started");
        let mut backoff = self.retry_interval;

        loop {
            let outcome = tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.cycle() => outcome,
            };

            match outcome {
                Ok(()) => backoff = self.retry_interval,
                Err(e) => {
                    if e.is_transient() {
                        warn!(key = %self.key, error = %e, retry_in = ?backoff, "remote listener failed, retrying");
                    } else {
                        warn!(key = %self.key, error = %e, retry_in = ?backoff, "remote listener rejected by server");
                    }

                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_RETRY_INTERVAL);
                }
            }
        }

        debug!(key = %self.key, "remote listener stopped");
    }

    /// One long poll, followed by a fetch and rewrite when the document changed.
    async fn cycle(&mut self) -> Result<()> {
        if !self.source.poll_changes(&self.key, &self.last_md5).await? {
            return Ok(());
        }

        let content = self.source.fetch(&self.key).await?;
        let md5 = content_md5(&content);
        if md5 == self.last_md5 {
            return Ok(());
        }

        info!(key = %self.key, md5 = %md5, "remote config changed");
        self.file.write(&content)?;
        self.last_md5 = md5;

        if let Err(e) = self.store.reload_from(ChangeOrigin::Remote).await {
            warn!(path = %self.file.path().display(), error = %e, "new remote config rejected, keeping previous");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConfigFormat;
    use crate::sources::MemorySource;
    use tempfile::TempDir;
    use tokio::time::timeout;

    struct Fixture {
        _dir: TempDir,
        source: Arc<MemorySource>,
        store: ConfigStore,
        file: LocalFile,
        key: ConfigKey,
    }

    fn fixture(initial: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let key = ConfigKey::new("dev", "orders", "DEFAULT_GROUP").unwrap();
        let file = LocalFile::new(dir.path(), &key, ConfigFormat::Json);
        file.write(initial).unwrap();

        let source = Arc::new(MemorySource::with_poll_timeout(Duration::from_millis(100)));
        source.set(&key, initial);

        let store = ConfigStore::load(file.path(), ConfigFormat::Json).unwrap();
        Fixture {
            _dir: dir,
            source,
            store,
            file,
            key,
        }
    }

    fn listener(fx: &Fixture, initial: &str) -> RemoteListener {
        RemoteListener {
            source: fx.source.clone(),
            key: fx.key.clone(),
            file: fx.file.clone(),
            store: fx.store.clone(),
            last_md5: content_md5(initial),
            retry_interval: Duration::from_millis(20),
        }
    }

    async fn wait_for_port(store: &ConfigStore, port: u32) {
        timeout(Duration::from_secs(3), async {
            while store.get_u32("port") != Some(port) {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("store never saw the new port");
    }

    #[tokio::test]
    async fn test_remote_change_rewrites_file_and_store() {
        let fx = fixture(r#"{"port": 8080}"#);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = listener(&fx, r#"{"port": 8080}"#).spawn(shutdown_rx);

        fx.source.set(&fx.key, r#"{"port": 9090}"#);
        wait_for_port(&fx.store, 9090).await;
        assert_eq!(fx.file.read().unwrap(), r#"{"port": 9090}"#);

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let fx = fixture(r#"{"port": 8080}"#);
        fx.source.fail_next(3);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let _handle = listener(&fx, r#"{"port": 8080}"#).spawn(shutdown_rx);

        fx.source.set(&fx.key, r#"{"port": 7070}"#);
        wait_for_port(&fx.store, 7070).await;
    }

    #[tokio::test]
    async fn test_invalid_remote_document_keeps_store() {
        let fx = fixture(r#"{"port": 8080}"#);
        let mut task = listener(&fx, r#"{"port": 8080}"#);

        fx.source.set(&fx.key, "{ broken");
        task.cycle().await.unwrap();

        // File mirrors the remote document, the store keeps the last good one
        assert_eq!(fx.file.read().unwrap(), "{ broken");
        assert_eq!(fx.store.get_u32("port"), Some(8080));
        assert_eq!(task.last_md5, content_md5("{ broken"));
    }

    #[tokio::test]
    async fn test_unchanged_poll_is_noop() {
        let fx = fixture(r#"{"port": 8080}"#);
        let mut task = listener(&fx, r#"{"port": 8080}"#);
        task.cycle().await.unwrap();
        assert_eq!(task.last_md5, content_md5(r#"{"port": 8080}"#));
    }

    #[tokio::test]
    async fn test_dropping_shutdown_sender_stops_task() {
        let fx = fixture(r#"{"port": 8080}"#);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = listener(&fx, r#"{"port": 8080}"#).spawn(shutdown_rx);

        drop(shutdown_tx);
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
