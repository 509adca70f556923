//! Configuration change notification system.
//!
//! Subscribers hear about every successful reload of the accessor store.
//! With the `file-watch` feature the materialized file is also watched on disk.

pub mod subscriber;

#[cfg(feature = "file-watch")]
pub mod watcher;

pub use subscriber::{ChangeOrigin, ConfigChange, SubscriberRegistry, SubscriptionHandle};

#[cfg(feature = "file-watch")]
pub use watcher::ConfigWatcher;
