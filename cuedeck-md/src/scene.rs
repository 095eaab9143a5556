//! Scene-load signals
//!
//! The host announces scene loads on a [`SceneSignals`] hub. Each
//! [`SceneSubscription`] receives every announcement made while it is alive
//! and unregisters itself when dropped, so the listener lifetime is the
//! lifetime of whatever owns the subscription.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, mpsc::UnboundedSender<String>)>>,
}

/// Scene-load announcement hub
///
/// Cheap to clone; clones share subscribers.
#[derive(Debug, Clone, Default)]
pub struct SceneSignals {
    registry: Arc<Registry>,
}

impl SceneSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce that `scene` finished loading
    ///
    /// Returns how many subscribers received it.
    pub fn announce(&self, scene: &str) -> usize {
        let Ok(mut subscribers) = self.registry.subscribers.lock() else {
            return 0;
        };
        subscribers.retain(|(_, tx)| !tx.is_closed());

        let delivered = subscribers
            .iter()
            .filter(|(_, tx)| tx.send(scene.to_string()).is_ok())
            .count();
        debug!("Scene '{}' announced to {} subscriber(s)", scene, delivered);
        delivered
    }

    /// Register a new listener
    pub fn subscribe(&self) -> SceneSubscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.registry.subscribers.lock() {
            subscribers.push((id, tx));
        }

        SceneSubscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry
            .subscribers
            .lock()
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

/// Live registration on a [`SceneSignals`] hub
#[derive(Debug)]
pub struct SceneSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<String>,
    registry: Weak<Registry>,
}

impl SceneSubscription {
    /// Next announced scene, if any (non-blocking)
    pub fn try_next(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// All scenes announced since the last call, oldest first
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Drop for SceneSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            if let Ok(mut subscribers) = registry.subscribers.lock() {
                subscribers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
