//! Physical connection to wrapper mapping.
//!
//! Entries are keyed by [`ConnectionId`] and validated against a `Weak` anchor owned by the
//! physical connection. The cache never holds the connection itself, so when the pool closes
//! a connection its anchor dies and the entry is treated as absent and pruned on the next
//! insert.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::pool::ConnectionId;

struct CacheEntry<T> {
    anchor: Weak<()>,
    value: Arc<T>,
}

impl<T> CacheEntry<T> {
    fn is_live(&self) -> bool {
        self.anchor.strong_count() > 0
    }

    fn belongs_to(&self, anchor: &Weak<()>) -> bool {
        self.is_live() && self.anchor.ptr_eq(anchor)
    }
}

pub(crate) struct IdentityCache<T> {
    entries: Mutex<HashMap<ConnectionId, CacheEntry<T>>>,
}

impl<T> Default for IdentityCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> IdentityCache<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Return the value cached for the physical connection, creating it when there is none.
    ///
    /// The flag is `true` when `create` ran, i.e. this is the first time the connection has
    /// been observed.
    pub(crate) fn resolve<F>(
        &self,
        id: ConnectionId,
        anchor: &Weak<()>,
        create: F,
    ) -> (Arc<T>, bool)
    where
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get(&id) {
            if entry.belongs_to(anchor) {
                return (Arc::clone(&entry.value), false);
            }
        }

        entries.retain(|_, entry| entry.is_live());

        let value = Arc::new(create());
        entries.insert(
            id,
            CacheEntry {
                anchor: anchor.clone(),
                value: Arc::clone(&value),
            },
        );
        (value, true)
    }

    pub(crate) fn forget(&self, id: ConnectionId) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub(crate) fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of entries whose physical connection is still open.
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.is_live())
            .count()
    }
}
