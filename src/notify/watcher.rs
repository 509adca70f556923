//! File watching for the materialized configuration file.

use crate::error::{ConfigError, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Watches one file and emits a debounced signal whenever it changes.
///
/// The parent directory is watched rather than the file itself, so a file
/// replaced by rename (as [`LocalFile::write`](crate::sources::LocalFile::write)
/// does) keeps being tracked. Events for sibling files are ignored.
///
/// # Examples
///
/// ```rust,no_run
/// use nacos_config::notify::ConfigWatcher;
/// use std::time::Duration;
///
/// # async fn example() -> nacos_config::error::Result<()> {
/// let (watcher, mut rx) =
///     ConfigWatcher::watch_file("/srv/app/application.json", Duration::from_millis(200))?;
///
/// while let Some(()) = rx.recv().await {
///     println!("{} changed", watcher.path().display());
/// }
/// # Ok(())
/// # }
/// ```
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
    debounce_duration: Duration,
}

impl ConfigWatcher {
    /// Start watching `path`.
    ///
    /// A burst of events is collapsed into one signal, sent once no further
    /// event arrived for `debounce_duration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory does not exist or the
    /// platform watcher cannot be created.
    pub fn watch_file(
        path: impl AsRef<Path>,
        debounce_duration: Duration,
    ) -> Result<(Self, mpsc::Receiver<()>)> {
        let path = path.as_ref().to_path_buf();
        let file_name: OsString = path
            .file_name()
            .ok_or_else(|| ConfigError::WatchError(format!("Not a file path: {}", path.display())))?
            .to_os_string();
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .canonicalize()
            .map_err(|e| ConfigError::WatchError(format!("Failed to resolve directory: {}", e)))?;

        let (tx, rx) = mpsc::channel(16);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                return;
            }
            if event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                let _ = event_tx.send(());
            }
        })
        .map_err(|e| ConfigError::WatchError(format!("Failed to create file watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::WatchError(format!("Failed to watch {}: {}", dir.display(), e)))?;

        tokio::spawn(async move {
            while event_rx.recv().await.is_some() {
                let mut closed = false;
                loop {
                    match timeout(debounce_duration, event_rx.recv()).await {
                        Ok(Some(())) => continue,
                        Ok(None) => {
                            closed = true;
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if tx.send(()).await.is_err() || closed {
                    break;
                }
            }
        });

        Ok((
            Self {
                _watcher: watcher,
                path,
                debounce_duration,
            },
            rx,
        ))
    }

    /// The watched file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the debounce duration for this watcher.
    pub fn debounce_duration(&self) -> Duration {
        self.debounce_duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_watch_missing_directory() {
        let result = ConfigWatcher::watch_file("/nonexistent/dir/app.json", Duration::from_millis(50));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_file_change_triggers_signal() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("application.json");
        fs::write(&config_path, r#"{"port": 8080}"#).unwrap();

        let (_watcher, mut rx) =
            ConfigWatcher::watch_file(&config_path, Duration::from_millis(50)).unwrap();

        let path = config_path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&path, r#"{"port": 9090}"#).unwrap();
        });

        let result = timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(result, Ok(Some(()))));
    }

    #[tokio::test]
    async fn test_rename_over_target_triggers_signal() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("application.json");
        fs::write(&config_path, r#"{"port": 8080}"#).unwrap();

        let (_watcher, mut rx) =
            ConfigWatcher::watch_file(&config_path, Duration::from_millis(50)).unwrap();

        let tmp_path = temp_dir.path().join(".application.json.tmp");
        let target = config_path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            fs::write(&tmp_path, r#"{"port": 9090}"#).unwrap();
            fs::rename(&tmp_path, &target).unwrap();
        });

        let result = timeout(Duration::from_secs(2), rx.recv()).await;
        assert!(matches!(result, Ok(Some(()))));
    }

    #[tokio::test]
    async fn test_sibling_changes_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("application.json");
        fs::write(&config_path, "{}").unwrap();

        let (_watcher, mut rx) =
            ConfigWatcher::watch_file(&config_path, Duration::from_millis(50)).unwrap();

        fs::write(temp_dir.path().join("other.json"), "{}").unwrap();

        let result = timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_debounce_duration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("application.json");
        let duration = Duration::from_millis(500);
        let (watcher, _rx) = ConfigWatcher::watch_file(&config_path, duration).unwrap();
        assert_eq!(watcher.debounce_duration(), duration);
        assert_eq!(watcher.path(), config_path.as_path());
    }
}
