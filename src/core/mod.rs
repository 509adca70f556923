//! Core client types: document key, format, accessor store and the client itself.

mod builder;
mod client;
pub mod coerce;
mod format;
mod key;
pub(crate) mod store;

pub use builder::{DEFAULT_DEBOUNCE, NacosConfigClientBuilder};
pub use client::NacosConfigClient;
pub use format::ConfigFormat;
pub use key::ConfigKey;
pub use store::ConfigStore;
