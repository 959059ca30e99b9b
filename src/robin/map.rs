use super::{DefaultHashBuilder, Keys, MapBuilder, MapIter, Values};
use crate::common::{capacity, hash, pool::CursorPool};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::repeat_with;
use std::mem;
use std::ops::AddAssign;

/// A Robin-Hood hash map for arbitrary `Hash + Eq` keys.
///
/// Values ride in an array parallel to the key slots and move together
/// with their keys through displacement, back-shift deletion, and
/// growth.
///
/// # Examples
///
/// ```rust
/// use linprobe::robin::Map;
///
/// let mut capitals: Map<String, &str> = Map::new();
/// capitals.insert("France".to_string(), "Paris");
/// capitals.insert("Japan".to_string(), "Tokyo");
///
/// assert_eq!(capitals.get("France"), Some(&"Paris"));
/// assert_eq!(capitals.remove("Japan"), Some("Tokyo"));
/// assert_eq!(capitals.len(), 1);
/// ```
pub struct Map<K, V, S = DefaultHashBuilder> {
    pub(crate) keys: Box<[Option<K>]>,
    pub(crate) values: Box<[Option<V>]>,
    /// Ideal slot of each occupant; meaningless for empty slots.
    home: Box<[usize]>,
    pub(crate) assigned: usize,
    resize_at: usize,
    load_factor: f64,
    perturbation: u64,
    build_hasher: S,
    pub(crate) cursors: CursorPool,
}

impl<K, V> Map<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    /// Constructs an empty `Map<K, V>` with default sizing (eight
    /// expected elements, load factor 0.75).
    pub fn new() -> Self {
        Self::with_parameters(
            capacity::DEFAULT_EXPECTED_ELEMENTS,
            capacity::DEFAULT_LOAD_FACTOR,
            DefaultHashBuilder::default(),
        )
    }

    /// Constructs an empty `Map<K, V>` sized so that the first
    /// `expected_elements` distinct inserts perform no reallocation.
    pub fn with_expected_elements(expected_elements: usize) -> Self {
        Self::with_parameters(
            expected_elements,
            capacity::DEFAULT_LOAD_FACTOR,
            DefaultHashBuilder::default(),
        )
    }

    /// Returns a [`MapBuilder`][builder-struct], which can also install a
    /// custom `BuildHasher`.
    ///
    /// [builder-struct]: ./struct.MapBuilder.html
    pub fn builder() -> MapBuilder<K, V> {
        MapBuilder::default()
    }
}

impl<K, V, S> Map<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub(crate) fn with_parameters(
        expected_elements: usize,
        load_factor: f64,
        build_hasher: S,
    ) -> Self {
        capacity::check_load_factor(load_factor);
        let slots = capacity::minimum_slots(expected_elements, load_factor);

        Self {
            keys: empty_slots(slots),
            values: empty_slots(slots),
            home: vec![0; slots].into_boxed_slice(),
            assigned: 0,
            resize_at: capacity::expand_at(slots, load_factor),
            load_factor,
            perturbation: hash::new_perturbation(),
            build_hasher,
            cursors: CursorPool::new(),
        }
    }

    /// Maps `key` to `value`, returning the previously stored value if
    /// the key was present.
    ///
    /// Displacement carries the value and cached home slot along with
    /// the key. Equality checks stop at the first displacement: a
    /// dislodged resident cannot equal any other resident.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let mask = self.mask();
        let mut slot = self.slot_of(&key);
        let mut carried_key = key;
        let mut carried_value = Some(value);
        let mut carried_home = slot;
        let mut distance = 0;
        let mut displaced = false;

        loop {
            match self.keys[slot].as_mut() {
                None => break,
                Some(existing) => {
                    if !displaced && *existing == carried_key {
                        return mem::replace(&mut self.values[slot], carried_value);
                    }
                    let existing_distance = slot.wrapping_sub(self.home[slot]) & mask;
                    if distance > existing_distance {
                        mem::swap(existing, &mut carried_key);
                        mem::swap(&mut self.values[slot], &mut carried_value);
                        mem::swap(&mut self.home[slot], &mut carried_home);
                        distance = existing_distance;
                        displaced = true;
                    }
                }
            }
            slot = (slot + 1) & mask;
            distance += 1;
        }

        if self.assigned == self.resize_at {
            self.grow_and_insert(slot, carried_key, carried_value);
        } else {
            self.keys[slot] = Some(carried_key);
            self.values[slot] = carried_value;
            self.home[slot] = carried_home;
        }
        self.assigned += 1;
        None
    }

    /// Inserts every pair yielded by `entries`, returning how many keys
    /// were newly added.
    pub fn insert_all<I>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut added = 0;
        for (key, value) in entries {
            if self.insert(key, value).is_none() {
                added += 1;
            }
        }
        added
    }

    /// Inserts only if `key` is absent. Returns `true` if the pair was
    /// stored; a present key keeps its current value.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        if self.contains_key(&key) {
            false
        } else {
            self.insert(key, value);
            true
        }
    }

    /// Returns a reference to the value for `key`.
    ///
    /// The key may be any borrowed form of the map's key type, but
    /// `Hash` and `Eq` on the borrowed form _must_ match those for the
    /// key type.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_slot(key)?;
        self.values[slot].as_ref()
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_slot(key)?;
        self.values[slot].as_mut()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_slot(key).is_some()
    }

    /// Looks `key` up once and returns a handle to its slot. The handle
    /// borrows the map exclusively, so reads and writes through it can
    /// never race a mutation that would move the entry.
    pub fn find<Q>(&mut self, key: &Q) -> Option<OccupiedEntry<'_, K, V, S>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_slot(key)?;
        Some(OccupiedEntry { map: self, slot })
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.find_slot(key)?;
        let value = self.values[slot].take();
        self.shift_conflicting_keys(slot);
        value
    }

    /// Removes every pair for which `predicate` returns `true`,
    /// returning the number removed.
    ///
    /// A panicking predicate propagates; removals completed before the
    /// panic stay applied and the map remains fully consistent.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
        let before = self.assigned;
        let mut slot = 0;
        while slot < self.keys.len() {
            let matched = match (self.keys[slot].as_ref(), self.values[slot].as_ref()) {
                (Some(key), Some(value)) => predicate(key, value),
                _ => false,
            };
            if matched {
                // The back-shift may have dropped another live pair into
                // this slot; re-examine it before moving on.
                self.values[slot] = None;
                self.shift_conflicting_keys(slot);
            } else {
                slot += 1;
            }
        }
        before - self.assigned
    }

    /// Keeps only the pairs for which `predicate` returns `true`,
    /// returning the number removed.
    pub fn retain(&mut self, mut predicate: impl FnMut(&K, &V) -> bool) -> usize {
        self.remove_if(move |key, value| !predicate(key, value))
    }

    /// Removes all pairs. Keeps the allocated slot arrays.
    pub fn clear(&mut self) {
        for slot in self.keys.iter_mut() {
            *slot = None;
        }
        for value in self.values.iter_mut() {
            *value = None;
        }
        self.assigned = 0;
    }
}

impl<K, V, S> Map<K, V, S>
where
    K: Hash + Eq,
    V: Copy + AddAssign,
    S: BuildHasher,
{
    /// Stores `put_value` if `key` is absent, otherwise adds `add_value`
    /// to the stored value. Returns the value now stored.
    pub fn put_or_add(&mut self, key: K, put_value: V, add_value: V) -> V {
        if let Some(slot) = self.find_slot(&key) {
            if let Some(value) = self.values[slot].as_mut() {
                *value += add_value;
                return *value;
            }
        }
        self.insert(key, put_value);
        put_value
    }

    /// Adds `value` to the stored value, inserting it if `key` is
    /// absent. Returns the value now stored.
    pub fn add_to(&mut self, key: K, value: V) -> V {
        self.put_or_add(key, value, value)
    }
}

//
// public, no bounds required
//
impl<K, V, S> Map<K, V, S> {
    pub fn len(&self) -> usize {
        self.assigned
    }

    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Number of entries this map can hold before its next reallocation.
    pub fn capacity(&self) -> usize {
        self.resize_at
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Visits all pairs in arbitrary order (decreasing slot index). The
    /// element type is `(&K, &V)`.
    pub fn iter(&self) -> MapIter<'_, K, V, S> {
        MapIter::new(self)
    }

    /// A view over the keys. The element type is `&K`.
    pub fn keys(&self) -> Keys<'_, K, V, S> {
        Keys(self.iter())
    }

    /// A view over the values. The element type is `&V`.
    pub fn values(&self) -> Values<'_, K, V, S> {
        Values(self.iter())
    }

    /// A mutable view over the values, in the same order as
    /// [`values`][Map::values].
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.values.iter_mut().rev().flatten()
    }
}

//
// private
//
impl<K, V, S> Map<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn mask(&self) -> usize {
        self.keys.len() - 1
    }

    #[inline]
    fn slot_of<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        hash::mix64(self.build_hasher.hash_one(key) ^ self.perturbation) as usize & self.mask()
    }

    fn find_slot<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mask = self.mask();
        let mut slot = self.slot_of(key);
        let mut distance = 0;
        loop {
            match self.keys[slot].as_ref() {
                None => return None,
                Some(existing) => {
                    if existing.borrow() == key {
                        return Some(slot);
                    }
                    // Out-distancing the resident proves the key absent.
                    if distance > (slot.wrapping_sub(self.home[slot]) & mask) {
                        return None;
                    }
                }
            }
            slot = (slot + 1) & mask;
            distance += 1;
        }
    }

    /// Closes the gap at `gap`, moving each pulled-back key together
    /// with its value and cached home, then blanks the final gap.
    fn shift_conflicting_keys(&mut self, mut gap: usize) {
        let mask = self.mask();
        let mut distance = 0;
        loop {
            distance += 1;
            let slot = (gap + distance) & mask;
            if self.keys[slot].is_none() {
                break;
            }
            let shift = slot.wrapping_sub(self.home[slot]) & mask;
            if shift >= distance {
                self.keys[gap] = self.keys[slot].take();
                self.values[gap] = self.values[slot].take();
                self.home[gap] = self.home[slot];
                gap = slot;
                distance = 0;
            }
        }
        self.keys[gap] = None;
        self.values[gap] = None;
        self.assigned -= 1;
    }

    /// Doubles the slot arrays and re-inserts everything, including the
    /// pair that triggered the growth. New buffers are allocated before
    /// any state changes; home slots are recomputed under the new mask.
    fn grow_and_insert(&mut self, free_slot: usize, key: K, value: Option<V>) {
        let new_slots = capacity::next_slots(self.keys.len(), self.assigned);
        let new_keys = empty_slots(new_slots);
        let new_values = empty_slots(new_slots);
        let new_home = vec![0; new_slots].into_boxed_slice();

        let mut old_keys = mem::replace(&mut self.keys, new_keys);
        let mut old_values = mem::replace(&mut self.values, new_values);
        self.home = new_home;
        self.resize_at = capacity::expand_at(new_slots, self.load_factor);
        old_keys[free_slot] = Some(key);
        old_values[free_slot] = value;

        // Reverse slot order keeps transient displacement chains short
        // while the new table fills.
        for slot in (0..old_keys.len()).rev() {
            if let Some(key) = old_keys[slot].take() {
                self.rehash_insert(key, old_values[slot].take());
            }
        }
    }

    fn rehash_insert(&mut self, key: K, value: Option<V>) {
        let mask = self.mask();
        let mut slot = self.slot_of(&key);
        let mut carried_key = key;
        let mut carried_value = value;
        let mut carried_home = slot;
        let mut distance = 0;

        loop {
            match self.keys[slot].as_mut() {
                None => break,
                Some(existing) => {
                    let existing_distance = slot.wrapping_sub(self.home[slot]) & mask;
                    if distance > existing_distance {
                        mem::swap(existing, &mut carried_key);
                        mem::swap(&mut self.values[slot], &mut carried_value);
                        mem::swap(&mut self.home[slot], &mut carried_home);
                        distance = existing_distance;
                    }
                }
            }
            slot = (slot + 1) & mask;
            distance += 1;
        }
        self.keys[slot] = Some(carried_key);
        self.values[slot] = carried_value;
        self.home[slot] = carried_home;
    }
}

fn empty_slots<T>(slots: usize) -> Box<[Option<T>]> {
    repeat_with(|| None).take(slots).collect()
}

impl<K, V> Default for Map<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Clone for Map<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// The clone draws a fresh perturbation seed and re-inserts every
    /// pair; equal contents, generally different slot layout.
    fn clone(&self) -> Self {
        let mut clone =
            Self::with_parameters(self.len(), self.load_factor, self.build_hasher.clone());
        for (key, value) in self.iter() {
            clone.insert(key.clone(), value.clone());
        }
        clone
    }
}

impl<K, V, S> PartialEq for Map<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for Map<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, V, S> Hash for Map<K, V, S>
where
    K: Hash + Eq,
    V: Hash,
    S: BuildHasher,
{
    /// Order-independent: a wrapping sum over `hash(key) + hash(value)`
    /// per pair under a fixed-seed hasher, so equal maps hash equal
    /// regardless of per-instance state.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let fold = hash::fold_state();
        let mut acc = 0u64;
        for slot in 0..self.keys.len() {
            if let (Some(key), Some(value)) = (self.keys[slot].as_ref(), self.values[slot].as_ref())
            {
                acc = acc.wrapping_add(fold.hash_one(key).wrapping_add(fold.hash_one(value)));
            }
        }
        state.write_u64(acc);
    }
}

impl<K, V, S> fmt::Debug for Map<K, V, S>
where
    K: Hash + Eq + fmt::Debug,
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for Map<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, entries: I) {
        self.insert_all(entries);
    }
}

impl<K, V> std::iter::FromIterator<(K, V)> for Map<K, V, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(entries: I) -> Self {
        let mut map = Self::new();
        map.insert_all(entries);
        map
    }
}

impl<'a, K, V, S> IntoIterator for &'a Map<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = MapIter<'a, K, V, S>;

    fn into_iter(self) -> MapIter<'a, K, V, S> {
        self.iter()
    }
}

/// An exclusive handle to one occupied map slot, produced by
/// [`Map::find`]. All accessors are slot-direct: no re-probing, no
/// re-hashing.
pub struct OccupiedEntry<'a, K, V, S> {
    map: &'a mut Map<K, V, S>,
    slot: usize,
}

impl<'a, K, V, S> OccupiedEntry<'a, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn key(&self) -> &K {
        self.map.keys[self.slot].as_ref().unwrap()
    }

    pub fn get(&self) -> &V {
        self.map.values[self.slot].as_ref().unwrap()
    }

    pub fn get_mut(&mut self) -> &mut V {
        self.map.values[self.slot].as_mut().unwrap()
    }

    /// Converts the handle into a value reference bound to the map's
    /// borrow.
    pub fn into_mut(self) -> &'a mut V {
        self.map.values[self.slot].as_mut().unwrap()
    }

    /// Replaces the stored value, returning the old one.
    pub fn insert(&mut self, value: V) -> V {
        mem::replace(self.get_mut(), value)
    }

    /// Removes the entry, back-shifting the cluster behind it, and
    /// returns the value.
    pub fn remove(self) -> V {
        let value = self.map.values[self.slot].take().unwrap();
        self.map.shift_conflicting_keys(self.slot);
        value
    }
}

//
// for testing
//
#[cfg(test)]
impl<K, V, S> Map<K, V, S>
where
    K: Hash + Eq + fmt::Debug,
    S: BuildHasher,
{
    pub(crate) fn slots_for_testing(&self) -> usize {
        self.keys.len()
    }

    /// Asserts the structural invariants, including that the value array
    /// mirrors key occupancy exactly and every home cache is fresh.
    pub(crate) fn check_invariants(&self) {
        assert!(self.keys.len().is_power_of_two());
        assert!(self.assigned < self.keys.len());

        let mask = self.mask();
        let mut live = 0;
        for slot in 0..self.keys.len() {
            let key = match self.keys[slot].as_ref() {
                Some(key) => key,
                None => {
                    assert!(self.values[slot].is_none());
                    continue;
                }
            };
            assert!(self.values[slot].is_some());
            live += 1;
            assert_eq!(
                self.home[slot],
                self.slot_of(key),
                "stale home cache for {:?}",
                key
            );

            let mut probe = self.home[slot];
            while probe != slot {
                assert!(
                    self.keys[probe].is_some(),
                    "hole in probe path of {:?}",
                    key
                );
                probe = (probe + 1) & mask;
            }
        }
        assert_eq!(live, self.assigned);
    }
}
