//! Local materialization of the remote document.

use crate::core::{ConfigFormat, ConfigKey};
use crate::error::{ConfigError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Base name of every materialized file.
pub const FILE_STEM: &str = "application";

/// The on-disk copy of a remote document.
///
/// Files live at `root/<namespace>/<data_id>/<group>/<format>/application.<ext>`
/// so that several documents can share one root without colliding.
///
/// # Examples
///
/// ```rust
/// use nacos_config::core::{ConfigFormat, ConfigKey};
/// use nacos_config::sources::LocalFile;
/// use std::path::Path;
///
/// let key = ConfigKey::new("prod", "orders", "DEFAULT_GROUP").unwrap();
/// let file = LocalFile::new("/srv/ns-config", &key, ConfigFormat::Yaml);
/// assert_eq!(
///     file.path(),
///     Path::new("/srv/ns-config/prod/orders/DEFAULT_GROUP/yaml/application.yaml")
/// );
/// ```
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    format: ConfigFormat,
}

impl LocalFile {
    /// Compute the materialized path for `key` under `root`.
    pub fn new(root: impl AsRef<Path>, key: &ConfigKey, format: ConfigFormat) -> Self {
        let path = root
            .as_ref()
            .join(key.namespace_id())
            .join(key.data_id())
            .join(key.group())
            .join(format.extension())
            .join(format!("{}.{}", FILE_STEM, format.extension()));

        Self { path, format }
    }

    /// Full path of the materialized file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the materialized file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Format of the document.
    pub fn format(&self) -> ConfigFormat {
        self.format
    }

    /// Whether the file has been materialized before.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Create the directory tree for the file.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(self.dir()).map_err(|e| {
            ConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to create {}: {}", self.dir().display(), e),
            ))
        })
    }

    /// Replace the file content atomically.
    ///
    /// The content is written to a uniquely named sibling temp file and
    /// renamed over the target, so a concurrent reader sees either the old
    /// or the new document and concurrent writers never share a temp file.
    pub fn write(&self, content: &str) -> Result<()> {
        self.ensure_dir()?;

        let mut tmp = NamedTempFile::new_in(self.dir())?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }

    /// Read the current file content.
    pub fn read(&self) -> Result<String> {
        fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::IoError(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", self.path.display(), e),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn key() -> ConfigKey {
        ConfigKey::new("ns-1", "orders", "DEFAULT_GROUP").unwrap()
    }

    #[test]
    fn test_layout() {
        let file = LocalFile::new("/root", &key(), ConfigFormat::Json);
        assert_eq!(
            file.path(),
            Path::new("/root/ns-1/orders/DEFAULT_GROUP/json/application.json")
        );
        assert_eq!(file.dir(), Path::new("/root/ns-1/orders/DEFAULT_GROUP/json"));
    }

    #[test]
    fn test_write_creates_directories() {
        let temp_dir = TempDir::new().unwrap();
        let file = LocalFile::new(temp_dir.path(), &key(), ConfigFormat::Yaml);
        assert!(!file.exists());

        file.write("port: 8080\n").unwrap();
        assert!(file.exists());
        assert_eq!(file.read().unwrap(), "port: 8080\n");
    }

    #[test]
    fn test_write_replaces_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = LocalFile::new(temp_dir.path(), &key(), ConfigFormat::Json);

        file.write(r#"{"port": 8080}"#).unwrap();
        file.write(r#"{"port": 9090}"#).unwrap();

        assert_eq!(file.read().unwrap(), r#"{"port": 9090}"#);
        // No temp file left behind
        let entries: Vec<_> = fs::read_dir(file.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_read_missing() {
        let temp_dir = TempDir::new().unwrap();
        let file = LocalFile::new(temp_dir.path(), &key(), ConfigFormat::Json);
        assert!(file.read().is_err());
    }

    #[test]
    fn test_concurrent_writes_all_succeed() {
        let temp_dir = TempDir::new().unwrap();
        let file = LocalFile::new(temp_dir.path(), &key(), ConfigFormat::Json);
        let contents = [r#"{"writer": 1}"#, r#"{"writer": 2}"#];

        for _ in 0..50 {
            let barrier = Arc::new(Barrier::new(contents.len()));
            let handles: Vec<_> = contents
                .iter()
                .copied()
                .map(|content| {
                    let file = file.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        file.write(content)
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap().unwrap();
            }
            assert!(contents.contains(&file.read().unwrap().as_str()));
        }

        let entries: Vec<_> = fs::read_dir(file.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
