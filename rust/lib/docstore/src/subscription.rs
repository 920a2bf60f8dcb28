use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use mycoerp_core::ServiceError;
use tracing::debug;

use crate::document::{Filter, Record};

/// Callback receiving the full filtered result set after every change.
pub type SnapshotHandler = Arc<dyn Fn(&[Record]) + Send + Sync>;

/// Callback receiving a subscription failure.
pub type ErrorHandler = Arc<dyn Fn(&ServiceError) + Send + Sync>;

/// Unique id of a registered subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub(crate) u64);

#[derive(Clone)]
pub(crate) struct Subscriber {
    pub(crate) id: SubscriptionId,
    pub(crate) collection: String,
    pub(crate) filter: Filter,
    pub(crate) on_snapshot: SnapshotHandler,
    pub(crate) on_error: ErrorHandler,
}

/// Registry of live subscribers, keyed by id.
pub(crate) struct Registry {
    subscribers: RwLock<BTreeMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn insert(&self, subscriber: Subscriber) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscriber.id, subscriber);
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Clone out every subscriber of `collection`.
    ///
    /// Handlers run after the lock is released so they may call back into
    /// the store (including unsubscribing themselves).
    pub(crate) fn for_collection(&self, collection: &str) -> Vec<Subscriber> {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|s| s.collection == collection)
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Handle for a registered subscription.
///
/// Call [`Subscription::unsubscribe`] or drop the handle to stop
/// notifications. Cancellation is idempotent and safe after the store
/// itself has been dropped.
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Registry>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<Registry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop notifications. Consumes the handle.
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                debug!("subscription {:?} cancelled", self.id);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
