//! Identity of a remote configuration document.

use crate::error::{ConfigError, Result};
use std::fmt;

/// The `(namespace, data id, group)` triple naming one remote document.
///
/// # Examples
///
/// ```rust
/// use nacos_config::core::ConfigKey;
///
/// let key = ConfigKey::new("prod", "orders-service", "DEFAULT_GROUP").unwrap();
/// assert_eq!(key.data_id(), "orders-service");
///
/// assert!(ConfigKey::new("", "orders-service", "DEFAULT_GROUP").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    namespace_id: String,
    data_id: String,
    group: String,
}

impl ConfigKey {
    /// Create a key.
    ///
    /// Each component becomes one directory of the materialized path, so
    /// empty values, `.`, `..` and values containing `/`, `\` or NUL are rejected.
    pub fn new(
        namespace_id: impl Into<String>,
        data_id: impl Into<String>,
        group: impl Into<String>,
    ) -> Result<Self> {
        let key = Self {
            namespace_id: namespace_id.into(),
            data_id: data_id.into(),
            group: group.into(),
        };

        check_component("namespace id", &key.namespace_id)?;
        check_component("data id", &key.data_id)?;
        check_component("group", &key.group)?;

        Ok(key)
    }

    /// Namespace id, sent to Nacos as `tenant`.
    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    /// Data id of the document.
    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    /// Group of the document.
    pub fn group(&self) -> &str {
        &self.group
    }
}

fn check_component(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidArgument(format!("{} cannot be empty", name)));
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(ConfigError::InvalidArgument(format!(
            "{} must be a single path component: {:?}",
            name, value
        )));
    }
    Ok(())
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace_id, self.group, self.data_id)
    }
}
