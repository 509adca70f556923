//! Subscriber-based notifications for configuration changes.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// What triggered a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// The remote service published a new version.
    Remote,
    /// The materialized file changed on disk.
    LocalFile,
    /// A caller asked for a reload.
    Manual,
}

/// Passed to subscribers after the accessor store swapped in a new document.
#[derive(Debug, Clone)]
pub struct ConfigChange {
    /// What triggered the reload
    pub origin: ChangeOrigin,
    /// The materialized file that was re-read
    pub path: PathBuf,
}

type Callback = Box<dyn Fn(&ConfigChange) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
pub struct SubscriptionHandle {
    id: usize,
    registry: Arc<RwLock<SubscriberRegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let id = self.id;
        if let Ok(mut inner) = self.registry.try_write() {
            inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
            return;
        }

        // Registry busy notifying; finish the removal once it is released
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let registry = Arc::clone(&self.registry);
                handle.spawn(async move {
                    let mut inner = registry.write().await;
                    inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
                });
            }
            Err(_) => {
                debug!(
                    subscriber = id,
                    "registry busy and no tokio runtime, subscriber stays registered"
                );
            }
        }
    }
}

struct SubscriberRegistryInner {
    subscribers: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Registry for managing configuration change subscribers.
///
/// # Examples
///
/// ```rust
/// use nacos_config::notify::{ChangeOrigin, ConfigChange, SubscriberRegistry};
///
/// # async fn example() {
/// let registry = SubscriberRegistry::new();
///
/// let handle = registry.subscribe(|change: &ConfigChange| {
///     println!("{:?} change to {}", change.origin, change.path.display());
/// }).await;
///
/// registry
///     .notify_all(&ConfigChange { origin: ChangeOrigin::Manual, path: "app.json".into() })
///     .await;
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// # }
/// ```
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriberRegistryInner {
                subscribers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a callback invoked after every successful reload.
    pub async fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&ConfigChange) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Box::new(callback)));

        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Call every subscriber in subscription order.
    pub async fn notify_all(&self, change: &ConfigChange) {
        let inner = self.inner.read().await;
        for (_id, callback) in &inner.subscribers {
            callback(change);
        }
    }

    /// Get the number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.inner.read().await.subscribers.len()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SubscriberRegistry {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
