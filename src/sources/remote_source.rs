//! Remote configuration source trait.

use crate::core::{ConfigFormat, ConfigKey};
use crate::error::Result;
use async_trait::async_trait;
use md5::{Digest, Md5};

/// Trait for remote configuration services.
///
/// [`NacosSource`](super::NacosSource) is the production implementation;
/// implement this trait to plug in another service or a test double.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch the current content of a document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`](crate::error::ConfigError::NotFound)
    /// when the document does not exist.
    async fn fetch(&self, key: &ConfigKey) -> Result<String>;

    /// Wait until the document may have changed.
    ///
    /// `content_md5` is the digest of the content the caller currently holds.
    /// Returns `true` when the server reports a change, `false` when the
    /// wait timed out without one.
    async fn poll_changes(&self, key: &ConfigKey, content_md5: &str) -> Result<bool>;

    /// Create or overwrite a document. Returns the server's verdict.
    async fn publish(&self, key: &ConfigKey, content: &str, format: ConfigFormat) -> Result<bool>;

    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;
}

/// Lowercase hex MD5 of the document content, as Nacos computes it.
pub fn content_md5(content: &str) -> String {
    format!("{:x}", Md5::digest(content.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_md5() {
        assert_eq!(content_md5(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_md5("hello"), "5d41402abc4b2a76b9719d911017c592");
    }
}
