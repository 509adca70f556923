//! Error types for nacos-config.

use std::fmt;

/// Result type alias for nacos-config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when fetching, materializing or reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required argument was empty or malformed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested document format is not supported.
    #[error("Unsupported config format: {0}. Supported: json, yaml, toml")]
    UnsupportedFormat(String),

    /// Client settings could not be loaded or are inconsistent.
    #[error("Invalid client settings: {0}")]
    SettingsError(String),

    /// Transport-level failure talking to the remote service.
    #[error("Remote request failed: {0}")]
    RemoteError(String),

    /// The remote service answered with a non-success status.
    #[error("Remote service returned status {status}: {body}")]
    RemoteStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly empty
        body: String,
    },

    /// The remote document does not exist.
    #[error("Config not found: dataId={data_id}, group={group}, namespace={namespace_id}")]
    NotFound {
        /// Namespace (tenant) of the document
        namespace_id: String,
        /// Data id of the document
        data_id: String,
        /// Group of the document
        group: String,
    },

    /// Login against the remote service failed.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Failed to parse the materialized configuration.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The requested key is not present.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The value under a key cannot be converted to the requested type.
    #[error("Type mismatch for key '{key}': {reason}")]
    TypeMismatch {
        /// The dotted key path
        key: String,
        /// Conversion failure detail
        reason: String,
    },

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

/// Validation error for configuration validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{}", msg),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{}' is invalid: {}", field, reason)
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

impl ConfigError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteError(_) | Self::IoError(_) => true,
            Self::RemoteStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
