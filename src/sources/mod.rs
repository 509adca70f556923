//! Remote config sources and the local file they are materialized into.

pub(crate) mod listener;
mod local;
mod memory;
mod nacos;
mod remote_source;

pub use listener::MAX_RETRY_INTERVAL;
pub use local::{FILE_STEM, LocalFile};
pub use memory::MemorySource;
pub use nacos::NacosSource;
pub use remote_source::{RemoteSource, content_md5};
