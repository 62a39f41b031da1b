//! Ordered listener registry.
//!
//! `subscribe` returns a [`Subscription`] guard; dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the listener. Listeners run outside
//! the registry lock, so a listener may unsubscribe itself or others while
//! being notified.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::ledger::block::Block;
use crate::observability::metrics;

/// Result returned by a listener. Errors are logged, never propagated.
pub type ListenerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type Callback = dyn Fn(&Arc<Block>) -> ListenerResult + Send + Sync;

struct Entry {
    id: u64,
    active: AtomicBool,
    callback: Box<Callback>,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    entries: Mutex<Vec<Arc<Entry>>>,
}

impl Inner {
    fn remove(&self, id: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| entry.id != id);
    }
}

/// Subscribers notified once per appended block, in registration order.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Inner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. It stays registered while the returned guard lives.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Arc<Block>) -> ListenerResult + Send + Sync + 'static,
    {
        let entry = Arc::new(Entry {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            active: AtomicBool::new(true),
            callback: Box::new(listener),
        });

        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());

        tracing::debug!(listener_id = entry.id, "Ledger listener subscribed");

        Subscription {
            entry,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Invoke every live listener with `block`. Returns the number of
    /// listeners that failed (returned an error or panicked).
    pub fn notify(&self, block: &Arc<Block>) -> usize {
        let entries: Vec<Arc<Entry>> = self
            .inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut failures = 0;
        for entry in entries {
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (entry.callback)(block))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    metrics::record_listener_failure();
                    tracing::warn!(
                        listener_id = entry.id,
                        block_index = block.index,
                        error = %e,
                        "Ledger listener failed"
                    );
                }
                Err(_) => {
                    failures += 1;
                    metrics::record_listener_failure();
                    tracing::warn!(
                        listener_id = entry.id,
                        block_index = block.index,
                        "Ledger listener panicked"
                    );
                }
            }
        }
        failures
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Scoped registration handle.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    entry: Arc<Entry>,
    registry: Weak<Inner>,
}

impl Subscription {
    /// Remove the listener. No notification starts after this returns.
    pub fn unsubscribe(self) {}

    pub fn is_active(&self) -> bool {
        self.entry.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.entry.active.store(false, Ordering::Release);
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.entry.id);
            tracing::debug!(listener_id = self.entry.id, "Ledger listener unsubscribed");
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.entry.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::digest::Sha256Hash;

    fn block() -> Arc<Block> {
        Arc::new(Block::genesis(1, &Sha256Hash))
    }

    #[test]
    fn test_notifies_in_subscription_order() {
        let registry = ListenerRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s1 = seen.clone();
        let _a = registry.subscribe(move |_| {
            s1.lock().unwrap().push("a");
            Ok(())
        });
        let s2 = seen.clone();
        let _b = registry.subscribe(move |_| {
            s2.lock().unwrap().push("b");
            Ok(())
        });

        assert_eq!(registry.notify(&block()), 0);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let reached = Arc::new(AtomicBool::new(false));

        let _bad = registry.subscribe(|_| Err("boom".into()));
        let _panics = registry.subscribe(|_| panic!("listener bug"));
        let r = reached.clone();
        let _good = registry.subscribe(move |_| {
            r.store(true, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(registry.notify(&block()), 2);
        assert!(reached.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let sub = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(registry.len(), 1);

        drop(sub);
        assert!(registry.is_empty());
        registry.notify(&block());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listener_can_unsubscribe_a_later_listener_mid_notify() {
        let registry = ListenerRegistry::new();
        let later_calls = Arc::new(AtomicU64::new(0));
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_for_first = slot.clone();
        let _first = registry.subscribe(move |_| {
            slot_for_first.lock().unwrap().take();
            Ok(())
        });
        let c = later_calls.clone();
        let later = registry.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        *slot.lock().unwrap() = Some(later);

        registry.notify(&block());
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = ListenerRegistry::new();
        let sub = registry.subscribe(|_| Ok(()));
        drop(registry);
        assert!(sub.is_active());
        sub.unsubscribe();
    }
}
