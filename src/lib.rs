//! # nacos-config
//!
//! Mirror a Nacos config document into a local file and read it through typed accessors.
//!
//! ## Overview
//!
//! `nacos-config` fetches one named document from a Nacos config service,
//! writes it under a predictable local path and keeps both in sync:
//! - Initial fetch and atomic materialization to
//!   `<root>/<namespace>/<data_id>/<group>/<format>/application.<ext>`
//! - Long-poll listener that rewrites the file when the remote changes
//! - Lock-free reads of the parsed document using `arc-swap`
//! - Validation hooks that reject bad documents and keep the last good one
//! - Optional file watching, so edits made by other processes are picked up
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nacos_config::prelude::*;
//!
//! # async fn example() -> nacos_config::error::Result<()> {
//! // NS_CONFIG_SERVER_HOST, NS_CONFIG_NAMESPACE_ID, NS_CONFIG_DATA_ID,
//! // NS_CONFIG_GROUP and NS_CONFIG_FORMAT drive everything
//! let client = NacosConfigClient::from_env().await?;
//!
//! let cfg = client.config();
//! let port = cfg.get_u32("server.port").unwrap_or(8080);
//! let timeout = cfg.get_duration("server.timeout");
//! let hosts = cfg.get_string_slice("upstream.hosts");
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `file-watch` (default): watch the materialized file with `notify`
//!
//! ```toml
//! [dependencies]
//! nacos-config = { version = "0.1", default-features = false }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod settings;
pub mod sources;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ConfigFormat, ConfigKey, ConfigStore, NacosConfigClient, NacosConfigClientBuilder};
    pub use crate::error::{ConfigError, Result, ValidationError};
    pub use crate::notify::{ChangeOrigin, ConfigChange};
    pub use crate::settings::ClientSettings;
    pub use crate::sources::{MemorySource, RemoteSource};
}
