use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;

/// An unbounded memoization map with at-most-once computation per key.
///
/// The mutex only guards the key → cell mapping and is never held while a
/// value is being computed, so a slow computation for one key does not block
/// callers interested in other keys. Concurrent callers for the *same* key
/// all block on that key's cell and observe the single computed value.
///
/// Nothing is ever evicted; entries live as long as the map.
#[derive(Debug)]
pub struct Memo<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Memo {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Memo<K, V> {
    pub fn new() -> Self {
        Memo::default()
    }

    /// Return the value for `key`, running `compute` if this is the first
    /// access. `compute` runs at most once per key, ever — including under
    /// concurrent first access.
    pub fn get_or_compute(&self, key: &K, compute: impl FnOnce() -> V) -> V {
        let cell = {
            let mut entries = self.entries.lock().expect("lock poisoned");
            entries.entry(key.clone()).or_default().clone()
        };

        cell.get_or_init(compute).clone()
    }
}
