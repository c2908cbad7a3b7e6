//! Lock-free holder of the currently published dataset.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::loader::Entries;

/// Holds the current snapshot.
///
/// A snapshot is never modified after it was published. Publishing swaps
/// the reference, so readers see either the old or the new dataset in
/// full and never contend with each other or with the writer.
pub struct SnapshotStore<K, T> {
    current: ArcSwap<Entries<K, T>>,
}

impl<K, T> SnapshotStore<K, T>
where
    K: Eq + Hash,
{
    /// Creates a store publishing `initial` right away.
    pub fn new(initial: Entries<K, T>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Looks up a single value in the current snapshot.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<T>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.current.load().get(key).cloned()
    }

    /// Returns the current snapshot.
    pub fn load(&self) -> Arc<Entries<K, T>> {
        self.current.load_full()
    }

    /// Number of entries in the current snapshot.
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the current snapshot.
    pub(crate) fn publish(&self, entries: Entries<K, T>) -> usize {
        let count = entries.len();
        self.current.store(Arc::new(entries));
        count
    }
}
