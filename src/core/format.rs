//! Supported document formats.

use crate::error::{ConfigError, Result};
use std::fmt;
use std::str::FromStr;

/// Format of the remote document and of its local materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigFormat {
    /// JSON (`application.json`)
    #[default]
    Json,
    /// YAML (`application.yaml`)
    Yaml,
    /// TOML (`application.toml`)
    Toml,
}

impl ConfigFormat {
    /// File extension used for the materialized file.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    /// Matching parser format in the `config` crate.
    pub fn file_format(&self) -> config::FileFormat {
        match self {
            Self::Json => config::FileFormat::Json,
            Self::Yaml => config::FileFormat::Yaml,
            Self::Toml => config::FileFormat::Toml,
        }
    }

    /// Value of the `type` field Nacos expects when publishing.
    ///
    /// Nacos has no TOML type, so TOML documents are published as text.
    pub fn nacos_type(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "text",
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            _ => Err(ConfigError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_formats() {
        assert_eq!("json".parse::<ConfigFormat>().unwrap(), ConfigFormat::Json);
        assert_eq!("YAML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!("yml".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!(" toml ".parse::<ConfigFormat>().unwrap(), ConfigFormat::Toml);
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = "xml".parse::<ConfigFormat>().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref f) if f == "xml"));
    }

    #[test]
    fn test_nacos_type() {
        assert_eq!(ConfigFormat::Yaml.nacos_type(), "yaml");
        assert_eq!(ConfigFormat::Toml.nacos_type(), "text");
    }
}
