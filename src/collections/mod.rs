//! Ordered, key-unique collections.
//!
//! [`OrderedKeyedCollection`] backs every "set of ids" and "set of named objects" in
//! the crate: the plugin list, the known-plugin set, display-order bookkeeping. Items
//! are addressed by a key extracted with an injected function and are always
//! enumerated in ascending key order, so anything written from a collection is
//! deterministic.
//!
//! Unkeyed sets are keyed by identity, see [`OrderedSet`].

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// A domain entity with an extractable unique key.
pub trait Keyed {
    type Key: Ord + Clone;

    fn key(&self) -> Self::Key;
}

/// Container of items that are unique by key and enumerated in ascending key order.
///
/// No operation fails loudly: inserting a duplicate key or removing a missing one
/// reports `false` and leaves the collection untouched.
#[derive(Clone)]
pub struct OrderedKeyedCollection<K, T, F = fn(&T) -> K> {
    items: BTreeMap<K, T>,
    key_fn: F,
}

/// Set keyed by the value itself.
pub type OrderedSet<T> = OrderedKeyedCollection<T, T>;

impl<K, T, F> OrderedKeyedCollection<K, T, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    /// Create an empty collection using `key_fn` to extract each item's key.
    pub fn new(key_fn: F) -> Self {
        Self {
            items: BTreeMap::new(),
            key_fn,
        }
    }

    /// Insert `item` unless an item with the same key is already stored.
    ///
    /// Returns `false` (and keeps the stored value) when the key is taken.
    pub fn insert(&mut self, item: T) -> bool {
        match self.items.entry((self.key_fn)(&item)) {
            btree_map::Entry::Occupied(_) => false,
            btree_map::Entry::Vacant(slot) => {
                slot.insert(item);
                true
            }
        }
    }

    /// Store `item`, replacing whatever had the same key. Returns the replaced item.
    pub fn replace(&mut self, item: T) -> Option<T> {
        let previous = self.remove_entry_for(&item);
        self.insert(item);
        previous
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn find(&self, key: &K) -> Option<&T> {
        self.items.get(key)
    }

    /// Remove the item stored under `key`. Returns whether anything was removed.
    pub fn remove_by_key(&mut self, key: &K) -> bool {
        self.items.remove(key).is_some()
    }

    /// Remove the entry that has the same key as `item`, whatever its value.
    pub fn remove(&mut self, item: &T) -> bool {
        self.remove_entry_for(item).is_some()
    }

    /// Remove every entry whose key matches the key of an item in `other`.
    pub fn except_with<'a, I>(&mut self, other: I)
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        for item in other {
            let key = (self.key_fn)(item);
            self.items.remove(&key);
        }
    }

    /// Remove every entry whose key is listed in `keys`.
    pub fn except_keys<'a, I>(&mut self, keys: I)
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        for key in keys {
            self.items.remove(key);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items in ascending key order.
    pub fn iter(&self) -> btree_map::Values<'_, K, T> {
        self.items.values()
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> btree_map::Keys<'_, K, T> {
        self.items.keys()
    }

    /// Key of `item` as this collection would compute it.
    pub fn key_of(&self, item: &T) -> K {
        (self.key_fn)(item)
    }

    fn remove_entry_for(&mut self, item: &T) -> Option<T> {
        let key = (self.key_fn)(item);
        self.items.remove(&key)
    }
}

impl<T> OrderedKeyedCollection<T::Key, T>
where
    T: Keyed,
{
    /// Collection keyed by [`Keyed::key`].
    pub fn keyed() -> Self {
        Self::new(T::key)
    }
}

impl<T> OrderedSet<T>
where
    T: Ord + Clone,
{
    /// Set keyed by the value itself.
    pub fn identity() -> Self {
        Self::new(T::clone)
    }
}

impl<T> Default for OrderedKeyedCollection<T::Key, T>
where
    T: Keyed,
{
    fn default() -> Self {
        Self::keyed()
    }
}

impl<T> FromIterator<T> for OrderedKeyedCollection<T::Key, T>
where
    T: Keyed,
{
    /// First occurrence of a key wins.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::keyed();
        collection.extend(iter);
        collection
    }
}

impl<K, T, F> Extend<T> for OrderedKeyedCollection<K, T, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.insert(item);
        }
    }
}

impl<'a, K, T, F> IntoIterator for &'a OrderedKeyedCollection<K, T, F>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    type Item = &'a T;
    type IntoIter = btree_map::Values<'a, K, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.values()
    }
}

impl<K, T, F> IntoIterator for OrderedKeyedCollection<K, T, F> {
    type Item = T;
    type IntoIter = btree_map::IntoValues<K, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_values()
    }
}

impl<K, T: fmt::Debug, F> fmt::Debug for OrderedKeyedCollection<K, T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.items.values()).finish()
    }
}
