use rustc_hash::FxHashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Process-lifetime memo table for expensive handles.
///
/// Each key owns an async once-cell, so concurrent first calls for the same
/// key run the constructor once. A failed construction drops the key's slot,
/// so the next call retries. Stored handles never expire.
pub struct HandleCache<K, V> {
    slots: Mutex<FxHashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> HandleCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        HandleCache {
            slots: Mutex::new(FxHashMap::default()),
        }
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, key: &K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            slots.entry(key.clone()).or_default().clone()
        };
        let result = slot.get_or_try_init(init).await.cloned();

        if result.is_err() && !slot.initialized() {
            let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
            let unchanged = slots
                .get(key)
                .is_some_and(|current| Arc::ptr_eq(current, &slot) && !current.initialized());
            if unchanged {
                slots.remove(key);
            }
        }

        result
    }

    /// Number of keys with a constructed handle.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.values().filter(|cell| cell.initialized()).count()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl<K, V> Default for HandleCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
