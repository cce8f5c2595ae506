//! Checkpoint/commit/undo store for immutable key-value pairs, grounded in
//! `BaseUndoMap`/`UndoMap`: every key inserted since the last `checkpoint`
//! is tracked in `deltas`; `undo` removes exactly those keys, `commit`
//! clears the tracking set without touching the map.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

pub struct UndoMap<K, V> {
    map: HashMap<K, V>,
    deltas: HashSet<K>,
}

impl<K, V> Default for UndoMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        UndoMap {
            map: HashMap::new(),
            deltas: HashSet::new(),
        }
    }
}

impl<K, V> UndoMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Inserts `k -> v`, recording `k` in the current checkpoint's delta
    /// set. A key inserted more than once between checkpoints still undoes
    /// cleanly since `deltas` is a set, not a log.
    pub fn insert(&mut self, k: K, v: V) -> Option<V> {
        self.deltas.insert(k.clone());
        self.map.insert(k, v)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.map.get(k)
    }

    pub fn contains(&self, k: &K) -> bool {
        self.map.contains_key(k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// No-op placeholder matching the checkpoint/commit/undo triad: a fresh
    /// delta set is already in effect the moment the prior one commits or
    /// undoes, so there is nothing to do here beyond the call itself.
    pub fn checkpoint(&mut self) {}

    pub fn commit(&mut self) {
        self.deltas.clear();
    }

    /// Removes every key inserted since the last checkpoint/commit.
    pub fn undo(&mut self) {
        for k in self.deltas.drain() {
            self.map.remove(&k);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_removes_only_keys_inserted_since_commit() {
        let mut m: UndoMap<String, i32> = UndoMap::new();
        m.insert("a".to_string(), 1);
        m.commit();
        m.insert("b".to_string(), 2);
        m.undo();
        assert!(m.contains(&"a".to_string()));
        assert!(!m.contains(&"b".to_string()));
    }
}
