use crate::core::{Entry, Subject};
use std::collections::HashMap;
use std::collections::hash_map::Iter;

/// Subject → Entry map owned by a single log instance.
///
/// Next to the live entries the store keeps a tombstone ledger: deletions
/// that have been applied, remembered until they age out so that stale
/// writes cannot bring a deleted subject back.
#[derive(Debug, Clone)]
pub struct StateStore<K, P> {
    entries: HashMap<K, Entry<K, P>>,
    tombstones: HashMap<K, Entry<K, P>>,
}

impl<K: Subject, P> StateStore<K, P> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            tombstones: HashMap::new(),
        }
    }

    pub fn get(&self, subject: &K) -> Option<&Entry<K, P>> {
        self.entries.get(subject)
    }

    /// Stores a live entry, replacing whatever was held for its subject.
    pub fn put(&mut self, entry: Entry<K, P>) -> Option<Entry<K, P>> {
        self.entries.insert(entry.subject.clone(), entry)
    }

    pub fn delete(&mut self, subject: &K) -> Option<Entry<K, P>> {
        self.entries.remove(subject)
    }

    pub fn contains(&self, subject: &K) -> bool {
        self.entries.contains_key(subject)
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&Entry<K, P>),
    {
        for entry in self.entries.values() {
            f(entry);
        }
    }

    pub fn iter(&self) -> Iter<'_, K, Entry<K, P>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Tombstone ledger

    pub fn tombstone(&self, subject: &K) -> Option<&Entry<K, P>> {
        self.tombstones.get(subject)
    }

    pub fn put_tombstone(&mut self, tombstone: Entry<K, P>) -> Option<Entry<K, P>> {
        self.tombstones.insert(tombstone.subject.clone(), tombstone)
    }

    pub fn tombstones(&self) -> impl Iterator<Item = &Entry<K, P>> {
        self.tombstones.values()
    }

    pub fn tombstone_count(&self) -> usize {
        self.tombstones.len()
    }

    pub(crate) fn retain_entries<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut Entry<K, P>) -> bool,
    {
        self.entries.retain(f);
    }

    pub(crate) fn retain_tombstones<F>(&mut self, f: F)
    where
        F: FnMut(&K, &mut Entry<K, P>) -> bool,
    {
        self.tombstones.retain(f);
    }
}

impl<K: Subject, P> Default for StateStore<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Subject, P: PartialEq> PartialEq for StateStore<K, P> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.tombstones == other.tombstones
    }
}
