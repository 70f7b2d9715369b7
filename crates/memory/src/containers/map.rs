//! Hash map bound to one allocator
//!
//! # Layout
//!
//! ```text
//! index:   [ 2 | - | 0 | - | 1 | - | - | - ]   slot -> entry, linear probing
//! entries: [ (h0,k0,v0) (h1,k1,v1) (h2,k2,v2) ]  dense, insertion order
//! ```
//!
//! Both arrays live in the captured allocator. The index table is rebuilt at
//! twice its size whenever the load would pass 3/4. Removal empties the slot
//! with backward-shift deletion (no tombstones) and swap-removes the entry,
//! so iteration follows insertion order only until the first removal.

use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::slice;

use hashbrown::DefaultHashBuilder;

use super::buf::Buf;
use super::raw::MIN_CAPACITY;
use crate::allocator::Allocator;
use crate::context;
use crate::error::{MemoryError, MemoryResult};

const EMPTY: usize = usize::MAX;

struct Entry<K, V> {
    hash: u64,
    key: K,
    value: V,
}

/// Open-addressing hash map
///
/// The index table and the entries are two separate blocks, so a map in a
/// [`StackAllocator`](crate::StackAllocator) can only grow while its entries
/// stay within their first reservation; growing the entries after the index
/// was allocated on top of them panics. Reserve up front or use another
/// strategy.
///
/// ```
/// use ambit_memory::{Allocator, Map};
///
/// let mut ages = Map::with_allocator(Allocator::general());
/// ages.insert("ada", 36);
/// ages.insert("alan", 41);
/// assert_eq!(ages.get("ada"), Some(&36));
/// assert_eq!(ages.remove("alan"), Some(41));
/// assert_eq!(ages.len(), 1);
/// ```
pub struct Map<K, V, S = DefaultHashBuilder> {
    // dropped before `entries`: it sits above them in a stack allocator
    index: Buf<usize>,
    entries: Buf<Entry<K, V>>,
    hasher: S,
}

impl<K, V> Map<K, V, DefaultHashBuilder> {
    /// Empty map on the current allocator
    pub fn new() -> Self {
        Self::with_allocator(context::current())
    }

    /// Empty map on `allocator`; nothing is allocated yet
    pub fn with_allocator(allocator: Allocator) -> Self {
        Self::with_hasher_in(DefaultHashBuilder::default(), allocator)
    }
}

impl<K, V, S> Map<K, V, S> {
    /// Empty map using `hasher`, allocating from `allocator`
    pub fn with_hasher_in(hasher: S, allocator: Allocator) -> Self {
        Self {
            entries: Buf::with_allocator(allocator.clone()),
            index: Buf::with_allocator(allocator),
            hasher,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries the map holds before the index table is rebuilt
    pub fn capacity(&self) -> usize {
        self.index.len() / 4 * 3
    }

    pub fn allocator(&self) -> &Allocator {
        self.entries.allocator()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Remove every entry, keeping the allocated storage
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.fill(EMPTY);
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.entries.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.index.len() - 1
    }

    #[inline]
    fn ideal_slot(&self, hash: u64) -> usize {
        hash as usize & self.mask()
    }

    /// Index table size needed for `entries` entries under a 3/4 load
    fn table_size_for(entries: usize) -> MemoryResult<usize> {
        entries
            .checked_mul(4)
            .map(|n| n.div_ceil(3))
            .and_then(|n| n.max(MIN_CAPACITY).checked_next_power_of_two())
            .ok_or_else(|| MemoryError::capacity_overflow(entries))
    }

    /// Rebuild the index table with `size` slots
    ///
    /// The old table stays intact when the reservation fails.
    fn try_rebuild(&mut self, size: usize) -> MemoryResult<()> {
        self.index.try_reserve_exact(size.saturating_sub(self.index.len()))?;
        self.index.clear();
        self.index.resize(size, EMPTY);
        let mask = size - 1;
        for (i, entry) in self.entries.iter().enumerate() {
            let mut slot = entry.hash as usize & mask;
            while self.index[slot] != EMPTY {
                slot = (slot + 1) & mask;
            }
            self.index[slot] = i;
        }
        Ok(())
    }

    fn try_reserve_entries(&mut self, additional: usize) -> MemoryResult<()> {
        let wanted = self
            .len()
            .checked_add(additional)
            .ok_or_else(|| MemoryError::capacity_overflow(usize::MAX))?;
        let size = if wanted > self.capacity() {
            Some(Self::table_size_for(wanted)?.max(self.index.len() * 2))
        } else {
            None
        };
        self.entries.try_reserve(additional)?;
        match size {
            Some(size) => self.try_rebuild(size),
            None => Ok(()),
        }
    }

    /// Slot holding entry `entry`, found by probing from its hash
    fn slot_of_entry(&self, entry: usize) -> usize {
        let mut slot = self.ideal_slot(self.entries[entry].hash);
        while self.index[slot] != entry {
            slot = (slot + 1) & self.mask();
        }
        slot
    }

    /// Empty `slot`, shifting later members of its probe run back
    fn vacate(&mut self, mut hole: usize) {
        let mask = self.mask();
        let mut probe = hole;
        loop {
            probe = (probe + 1) & mask;
            let occupant = self.index[probe];
            if occupant == EMPTY {
                break;
            }
            let ideal = self.ideal_slot(self.entries[occupant].hash);
            // distance from ideal to probe vs from ideal to hole, cyclically
            if (probe.wrapping_sub(ideal) & mask) >= (probe.wrapping_sub(hole) & mask) {
                self.index[hole] = occupant;
                hole = probe;
            }
        }
        self.index[hole] = EMPTY;
    }
}

impl<K, V, S> Map<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Room for `additional` more entries without rebuilding the index
    pub fn reserve(&mut self, additional: usize) {
        super::raw::handle_reserve(self.try_reserve(additional));
    }

    pub fn try_reserve(&mut self, additional: usize) -> MemoryResult<()> {
        self.try_reserve_entries(additional)
    }

    fn find<Q>(&self, hash: u64, key: &Q) -> Option<(usize, usize)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        if self.index.is_empty() {
            return None;
        }
        let mut slot = self.ideal_slot(hash);
        loop {
            let entry = self.index[slot];
            if entry == EMPTY {
                return None;
            }
            let candidate = &self.entries[entry];
            if candidate.hash == hash && candidate.key.borrow() == key {
                return Some((slot, entry));
            }
            slot = (slot + 1) & self.mask();
        }
    }

    /// Insert or replace; returns the previous value for `key`
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hasher.hash_one(&key);
        if let Some((_, entry)) = self.find(hash, &key) {
            return Some(core::mem::replace(&mut self.entries[entry].value, value));
        }

        super::raw::handle_reserve(self.try_reserve_entries(1));
        let mut slot = self.ideal_slot(hash);
        while self.index[slot] != EMPTY {
            slot = (slot + 1) & self.mask();
        }
        self.index[slot] = self.entries.len();
        self.entries.push(Entry { hash, key, value });
        None
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.find(hash, key).map(|(_, entry)| &self.entries[entry].value)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        self.find(hash, key).map(|(_, entry)| {
            let entry = &self.entries[entry];
            (&entry.key, &entry.value)
        })
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let (_, entry) = self.find(hash, key)?;
        Some(&mut self.entries[entry].value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Remove `key`; the last entry moves into the freed position
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hasher.hash_one(key);
        let (slot, entry) = self.find(hash, key)?;
        self.vacate(slot);

        let last = self.entries.len() - 1;
        if entry != last {
            let moved = self.slot_of_entry(last);
            self.index[moved] = entry;
        }
        let removed = self.entries.swap_remove(entry);
        Some((removed.key, removed.value))
    }
}

impl<K, V> Default for Map<K, V, DefaultHashBuilder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug, S> fmt::Debug for Map<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for Map<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a Map<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Entries in storage order
pub struct Iter<'a, K, V> {
    inner: slice::Iter<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct IterMut<'a, K, V> {
    inner: slice::IterMut<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|e| (&e.key, &mut e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use core::hash::BuildHasherDefault;
    use core::hash::Hasher;

    use super::*;
    use crate::Str;

    /// Sends every key to the same slot
    #[derive(Default)]
    struct Collide;

    impl Hasher for Collide {
        fn finish(&self) -> u64 {
            5
        }
        fn write(&mut self, _: &[u8]) {}
    }

    fn map<K, V>() -> Map<K, V> {
        Map::with_allocator(Allocator::general())
    }

    #[test]
    fn insert_get_replace() {
        let mut m = map();
        assert_eq!(m.insert("a", 1), None);
        assert_eq!(m.insert("b", 2), None);
        assert_eq!(m.insert("a", 10), Some(1));
        assert_eq!(m.get("a"), Some(&10));
        assert_eq!(m.len(), 2);
        *m.get_mut("b").unwrap() += 1;
        assert_eq!(m.get("b"), Some(&3));
        assert!(!m.contains_key("c"));
    }

    #[test]
    fn grows_past_three_quarters_and_keeps_entries() {
        let mut m = map();
        for i in 0..6 {
            m.insert(i, i * 10);
        }
        assert_eq!(m.capacity(), 6);
        m.insert(6, 60);
        assert_eq!(m.capacity(), 12);
        for i in 0..1000 {
            m.insert(i, i * 10);
        }
        assert_eq!(m.len(), 1000);
        assert!(m.len() * 4 <= m.index.len() * 3);
        assert!((0..1000).all(|i| m.get(&i) == Some(&(i * 10))));
    }

    #[test]
    fn insertion_order_until_removal() {
        let mut m = map();
        for key in ["x", "y", "z", "w"] {
            m.insert(key, ());
        }
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), ["x", "y", "z", "w"]);
        m.remove("y");
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), ["x", "w", "z"]);
    }

    #[test]
    fn removal_keeps_probe_runs_reachable() {
        let mut m: Map<u32, u32, BuildHasherDefault<Collide>> =
            Map::with_hasher_in(BuildHasherDefault::default(), Allocator::general());
        for i in 0..5 {
            m.insert(i, i);
        }
        assert_eq!(m.remove(&1), Some(1));
        assert_eq!(m.remove(&0), Some(0));
        for i in 2..5 {
            assert_eq!(m.get(&i), Some(&i));
        }
        m.insert(9, 9);
        assert_eq!(m.len(), 4);
        assert_eq!(m.values().sum::<u32>(), 2 + 3 + 4 + 9);
    }

    #[test]
    fn str_keys_on_the_same_allocator() {
        let allocator = Allocator::leak_tracking(Allocator::general());
        let mut m = Map::with_allocator(allocator.clone());
        for word in ["alpha", "beta", "gamma"] {
            m.insert(Str::from_str_in(word, allocator.clone()), word.len());
        }
        assert_eq!(m.get("beta"), Some(&4));
        assert_eq!(m.remove("alpha"), Some(5));
        drop(m);
        let leaks = allocator.as_leak_tracking().map(|t| t.outstanding_count());
        assert_eq!(leaks, Some(0));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn failed_reserve_keeps_every_entry() {
        let mut m = map();
        for i in 0..4u32 {
            m.insert(i, i);
        }
        let capacity = m.capacity();

        assert!(m.try_reserve(1 << 44).is_err());
        assert_eq!(m.len(), 4);
        assert_eq!(m.capacity(), capacity);
        for i in 0..4 {
            assert_eq!(m.get(&i), Some(&i));
        }
        assert_eq!(m.remove(&2), Some(2));
        m.insert(7, 7);
        assert_eq!(m.get(&7), Some(&7));
    }

    #[test]
    fn clear_keeps_storage() {
        let mut m = map();
        m.extend((0..20).map(|i| (i, i)));
        let capacity = m.capacity();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.get(&3), None);
        assert_eq!(m.capacity(), capacity);
        m.insert(3, 3);
        assert_eq!(m.iter().collect::<Vec<_>>(), [(&3, &3)]);
    }
}
