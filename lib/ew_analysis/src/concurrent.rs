//! Sharded concurrent set shared between analysis tasks.

use parking_lot::RwLock;
use std::collections::hash_map::RandomState;
use std::collections::HashSet;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

const NB_SHARDS: usize = 16;

struct Shard<T> {
    // mirrors `set.len()`, updated under the write lock
    len: AtomicUsize,
    set: RwLock<HashSet<T>>,
}

impl<T> Default for Shard<T> {
    fn default() -> Self {
        Self {
            len: AtomicUsize::new(0),
            set: RwLock::new(HashSet::new()),
        }
    }
}

/// A set that can be read and updated from several threads through a shared reference.
///
/// Two levels of lookups are offered: [`contains`](Self::contains) is linearizable with
/// respect to insertions and removals, while [`contains_relaxed`](Self::contains_relaxed)
/// may miss concurrent updates but skips locking entirely on empty shards.
pub struct ConcurrentSet<T> {
    hasher: RandomState,
    shards: Box<[Shard<T>]>,
}

impl<T: Hash + Eq> Default for ConcurrentSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Hash + Eq> ConcurrentSet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hasher: RandomState::new(),
            shards: (0..NB_SHARDS).map(|_| Shard::default()).collect(),
        }
    }

    fn shard(&self, value: &T) -> &Shard<T> {
        let mut hasher = self.hasher.build_hasher();
        value.hash(&mut hasher);
        let idx = (hasher.finish() % NB_SHARDS as u64) as usize;
        &self.shards[idx]
    }

    /// Inserts a value, returning whether it was absent.
    pub fn insert(&self, value: T) -> bool {
        let shard = self.shard(&value);
        let mut set = shard.set.write();
        let inserted = set.insert(value);
        shard.len.store(set.len(), Ordering::Release);
        inserted
    }

    /// Removes a value, returning whether it was present.
    pub fn remove(&self, value: &T) -> bool {
        let shard = self.shard(value);
        let mut set = shard.set.write();
        let removed = set.remove(value);
        shard.len.store(set.len(), Ordering::Release);
        removed
    }

    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.shard(value).set.read().contains(value)
    }

    /// Possibly stale lookup, for hot paths where a missed concurrent update only
    /// causes redundant work.
    #[must_use]
    pub fn contains_relaxed(&self, value: &T) -> bool {
        let shard = self.shard(value);
        if shard.len.load(Ordering::Relaxed) == 0 {
            return false;
        }
        shard.set.read().contains(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.len.load(Ordering::Acquire))
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Hash + Eq + Clone> ConcurrentSet<T> {
    /// Copies the current content of the set.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.shards
            .iter()
            .flat_map(|shard| shard.set.read().iter().cloned().collect::<Vec<_>>())
            .collect()
    }
}

impl<T: Hash + Eq + Clone + Ord> ConcurrentSet<T> {
    #[must_use]
    pub fn to_sorted_vec(&self) -> Vec<T> {
        let mut values = self.snapshot();
        values.sort();
        values
    }
}

impl<T: Hash + Eq> FromIterator<T> for ConcurrentSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<T: Hash + Eq + Clone + fmt::Debug> fmt::Debug for ConcurrentSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn insert_remove() {
        let set = ConcurrentSet::new();
        assert!(set.is_empty());
        assert!(!set.contains_relaxed(&3));
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.contains(&3));
        assert!(set.contains_relaxed(&3));
        assert_eq!(set.len(), 1);
        assert!(set.remove(&3));
        assert!(!set.remove(&3));
        assert!(!set.contains(&3));
        assert!(set.is_empty());
    }

    #[test]
    fn parallel_inserts() {
        let set = ConcurrentSet::new();
        (0..1000u32).into_par_iter().for_each(|i| {
            set.insert(i % 100);
        });
        assert_eq!(set.len(), 100);
        assert_eq!(set.to_sorted_vec(), (0..100).collect::<Vec<_>>());

        let copy: ConcurrentSet<u32> = set.snapshot().into_iter().collect();
        assert_eq!(copy.len(), 100);
    }
}
