use super::{DefaultHashBuilder, SetBuilder, SetIter};
use crate::common::{capacity, hash, pool::CursorPool};

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash, Hasher};
use std::iter::repeat_with;
use std::mem;

/// A Robin-Hood hash set for arbitrary `Hash + Eq` keys.
///
/// # Examples
///
/// ```rust
/// use linprobe::robin::Set;
///
/// let mut names: Set<String> = Set::new();
/// names.insert("alice".to_string());
/// names.insert("bob".to_string());
///
/// // Lookups accept any borrowed form of the key type.
/// assert!(names.contains("alice"));
/// assert!(!names.insert("bob".to_string()));
///
/// names.remove("alice");
/// assert_eq!(names.len(), 1);
/// ```
///
/// # Hashing
///
/// Raw key hashes come from the container's `BuildHasher` (aHash by
/// default) and are then scrambled with a per-instance perturbation
/// seed, so two sets fed the same keys probe along unrelated slot
/// sequences. [`clone`][Clone::clone] draws a fresh seed and re-inserts
/// every element.
pub struct Set<K, S = DefaultHashBuilder> {
    pub(crate) keys: Box<[Option<K>]>,
    /// Ideal slot of each occupant; meaningless for empty slots.
    home: Box<[usize]>,
    pub(crate) assigned: usize,
    resize_at: usize,
    load_factor: f64,
    perturbation: u64,
    build_hasher: S,
    pub(crate) cursors: CursorPool,
}

impl<K> Set<K, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    /// Constructs an empty `Set<K>` with default sizing (eight expected
    /// elements, load factor 0.75).
    pub fn new() -> Self {
        Self::with_parameters(
            capacity::DEFAULT_EXPECTED_ELEMENTS,
            capacity::DEFAULT_LOAD_FACTOR,
            DefaultHashBuilder::default(),
        )
    }

    /// Constructs an empty `Set<K>` sized so that the first
    /// `expected_elements` distinct inserts perform no reallocation.
    pub fn with_expected_elements(expected_elements: usize) -> Self {
        Self::with_parameters(
            expected_elements,
            capacity::DEFAULT_LOAD_FACTOR,
            DefaultHashBuilder::default(),
        )
    }

    /// Returns a [`SetBuilder`][builder-struct], which can also install a
    /// custom `BuildHasher`.
    ///
    /// [builder-struct]: ./struct.SetBuilder.html
    pub fn builder() -> SetBuilder<K> {
        SetBuilder::default()
    }
}

impl<K, S> Set<K, S>
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
            home: vec![0; slots].into_boxed_slice(),
            assigned: 0,
            resize_at: capacity::expand_at(slots, load_factor),
            load_factor,
            perturbation: hash::new_perturbation(),
            build_hasher,
            cursors: CursorPool::new(),
        }
    }

    /// Adds `key` to the set. Returns `true` if the key was not already
    /// present.
    ///
    /// A key that has probed farther than the resident it lands on
    /// displaces that resident, which then continues down the chain with
    /// the displaced key's (shorter) remaining journey. Equality checks
    /// stop at the first displacement: a dislodged resident cannot equal
    /// any other resident.
    pub fn insert(&mut self, key: K) -> bool {
        let mask = self.mask();
        let mut slot = self.slot_of(&key);
        let mut carried = key;
        let mut carried_home = slot;
        let mut distance = 0;
        let mut displaced = false;

        loop {
            match self.keys[slot].as_mut() {
                None => break,
                Some(existing) => {
                    if !displaced && *existing == carried {
                        return false;
                    }
                    let existing_distance = slot.wrapping_sub(self.home[slot]) & mask;
                    if distance > existing_distance {
                        mem::swap(existing, &mut carried);
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
            self.grow_and_insert(slot, carried);
        } else {
            self.keys[slot] = Some(carried);
            self.home[slot] = carried_home;
        }
        self.assigned += 1;
        true
    }

    /// Adds every key yielded by `keys`, returning how many were newly
    /// inserted.
    pub fn insert_all<I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
    {
        let mut added = 0;
        for key in keys {
            if self.insert(key) {
                added += 1;
            }
        }
        added
    }

    /// Returns `true` if the set contains `key`.
    ///
    /// The key may be any borrowed form of the set's key type, but
    /// `Hash` and `Eq` on the borrowed form _must_ match those for the
    /// key type.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_slot(key).is_some()
    }

    /// Removes `key`, back-shifting the probe cluster behind it. Returns
    /// `true` if the key was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.find_slot(key) {
            Some(slot) => {
                self.shift_conflicting_keys(slot);
                true
            }
            None => false,
        }
    }

    /// Removes every key for which `predicate` returns `true`, returning
    /// the number removed.
    ///
    /// A panicking predicate propagates; removals completed before the
    /// panic stay applied and the set remains fully consistent.
    pub fn remove_if(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let before = self.assigned;
        let mut slot = 0;
        while slot < self.keys.len() {
            let matched = match self.keys[slot].as_ref() {
                Some(key) => predicate(key),
                None => false,
            };
            if matched {
                // The back-shift may have dropped another live key into
                // this slot; re-examine it before moving on.
                self.shift_conflicting_keys(slot);
            } else {
                slot += 1;
            }
        }
        before - self.assigned
    }

    /// Keeps only the keys for which `predicate` returns `true`,
    /// returning the number removed.
    pub fn retain(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        self.remove_if(move |key| !predicate(key))
    }

    /// Removes every key present in `other`, returning the number
    /// removed.
    pub fn remove_all<S2>(&mut self, other: &Set<K, S2>) -> usize
    where
        S2: BuildHasher,
    {
        if other.len() < self.len() {
            let mut removed = 0;
            for key in other.iter() {
                if self.remove(key) {
                    removed += 1;
                }
            }
            removed
        } else {
            self.remove_if(|key| other.contains(key))
        }
    }

    /// Keeps only the keys present in `other`, returning the number
    /// removed.
    pub fn retain_all<S2>(&mut self, other: &Set<K, S2>) -> usize
    where
        S2: BuildHasher,
    {
        self.remove_if(|key| !other.contains(key))
    }

    /// Removes all keys. Keeps the allocated slot arrays.
    pub fn clear(&mut self) {
        for slot in self.keys.iter_mut() {
            *slot = None;
        }
        self.assigned = 0;
    }

    /// Copies the keys into a fresh `Vec`, in iteration order.
    pub fn to_vec(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.iter().cloned().collect()
    }
}

//
// public, no bounds required
//
impl<K, S> Set<K, S> {
    pub fn len(&self) -> usize {
        self.assigned
    }

    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Number of elements this set can hold before its next reallocation.
    pub fn capacity(&self) -> usize {
        self.resize_at
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Visits all keys in arbitrary order (decreasing slot index). The
    /// element type is `&K`.
    pub fn iter(&self) -> SetIter<'_, K, S> {
        SetIter::new(self)
    }
}

//
// private
//
impl<K, S> Set<K, S>
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
                    // No resident ever sits farther from its ideal slot
                    // than one placed later in the same chain, so once
                    // this walk out-distances the resident the key
                    // cannot be present.
                    if distance > (slot.wrapping_sub(self.home[slot]) & mask) {
                        return None;
                    }
                }
            }
            slot = (slot + 1) & mask;
            distance += 1;
        }
    }

    /// Closes the gap at `gap` by pulling back every following occupant
    /// whose ideal slot lies at or before the gap, carrying the cached
    /// home along, then blanks the final gap.
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
                self.home[gap] = self.home[slot];
                gap = slot;
                distance = 0;
            }
        }
        self.keys[gap] = None;
        self.assigned -= 1;
    }

    /// Doubles the slot arrays and re-inserts everything, including the
    /// key that triggered the growth. New buffers are allocated before
    /// any state changes; home slots are recomputed under the new mask.
    fn grow_and_insert(&mut self, free_slot: usize, pending: K) {
        let new_slots = capacity::next_slots(self.keys.len(), self.assigned);
        let new_keys = empty_slots(new_slots);
        let new_home = vec![0; new_slots].into_boxed_slice();

        let mut old_keys = mem::replace(&mut self.keys, new_keys);
        self.home = new_home;
        self.resize_at = capacity::expand_at(new_slots, self.load_factor);
        old_keys[free_slot] = Some(pending);

        // Reverse slot order: keys that displaced others go back in
        // first, which keeps transient displacement chains short while
        // the new table fills.
        for slot in (0..old_keys.len()).rev() {
            if let Some(key) = old_keys[slot].take() {
                self.rehash_insert(key);
            }
        }
    }

    /// Insert during a rehash: every key is known distinct, so no
    /// equality checks, but displacement still applies.
    fn rehash_insert(&mut self, key: K) {
        let mask = self.mask();
        let mut slot = self.slot_of(&key);
        let mut carried = key;
        let mut carried_home = slot;
        let mut distance = 0;

        loop {
            match self.keys[slot].as_mut() {
                None => break,
                Some(existing) => {
                    let existing_distance = slot.wrapping_sub(self.home[slot]) & mask;
                    if distance > existing_distance {
                        mem::swap(existing, &mut carried);
                        mem::swap(&mut self.home[slot], &mut carried_home);
                        distance = existing_distance;
                    }
                }
            }
            slot = (slot + 1) & mask;
            distance += 1;
        }
        self.keys[slot] = Some(carried);
        self.home[slot] = carried_home;
    }
}

fn empty_slots<K>(slots: usize) -> Box<[Option<K>]> {
    repeat_with(|| None).take(slots).collect()
}

impl<K> Default for Set<K, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> Clone for Set<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// The clone draws a fresh perturbation seed, so it must re-insert
    /// every element instead of copying the slot arrays; equal contents,
    /// generally different slot layout.
    fn clone(&self) -> Self {
        let mut clone =
            Self::with_parameters(self.len(), self.load_factor, self.build_hasher.clone());
        for key in self.iter() {
            clone.insert(key.clone());
        }
        clone
    }
}

impl<K, S> PartialEq for Set<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|key| other.contains(key))
    }
}

impl<K, S> Eq for Set<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
}

impl<K, S> Hash for Set<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Order-independent: a wrapping sum of fixed-seed per-key hashes,
    /// independent of this instance's `BuildHasher` and perturbation, so
    /// equal sets hash equal.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let fold = hash::fold_state();
        let mut acc = 0u64;
        for key in self.keys.iter().flatten() {
            acc = acc.wrapping_add(fold.hash_one(key));
        }
        state.write_u64(acc);
    }
}

impl<K, S> fmt::Debug for Set<K, S>
where
    K: Hash + Eq + fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S> Extend<K> for Set<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, keys: I) {
        self.insert_all(keys);
    }
}

impl<K> std::iter::FromIterator<K> for Set<K, DefaultHashBuilder>
where
    K: Hash + Eq,
{
    fn from_iter<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let mut set = Self::new();
        set.insert_all(keys);
        set
    }
}

impl<'a, K, S> IntoIterator for &'a Set<K, S> {
    type Item = &'a K;
    type IntoIter = SetIter<'a, K, S>;

    fn into_iter(self) -> SetIter<'a, K, S> {
        self.iter()
    }
}

//
// for testing
//
#[cfg(test)]
impl<K, S> Set<K, S>
where
    K: Hash + Eq + fmt::Debug,
    S: BuildHasher,
{
    pub(crate) fn slots_for_testing(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn perturbation_for_testing(&self) -> u64 {
        self.perturbation
    }

    pub(crate) fn slot_of_for_testing(&self, key: &K) -> usize {
        self.slot_of(key)
    }

    /// Asserts the structural invariants: an accurate assigned count, a
    /// fresh home cache for every occupant, a hole-free probe path from
    /// each occupant's home to its slot, and the displacement ordering
    /// (along a contiguous run, distance grows by at most one per slot).
    pub(crate) fn check_invariants(&self) {
        assert!(self.keys.len().is_power_of_two());
        assert!(self.assigned < self.keys.len());

        let mask = self.mask();
        let mut live = 0;
        for slot in 0..self.keys.len() {
            let key = match self.keys[slot].as_ref() {
                Some(key) => key,
                None => continue,
            };
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

            let prev = slot.wrapping_sub(1) & mask;
            if self.keys[prev].is_some() {
                let distance = slot.wrapping_sub(self.home[slot]) & mask;
                let prev_distance = prev.wrapping_sub(self.home[prev]) & mask;
                assert!(
                    distance <= prev_distance + 1,
                    "displacement order broken at slot {}",
                    slot
                );
            }
        }
        assert_eq!(live, self.assigned);
    }
}

#[cfg(test)]
mod tests {
    use super::Set;

    fn hash_of(set: &Set<String>) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn insert_contains_remove_borrowed_lookups() {
        let mut set: Set<String> = Set::new();
        assert!(set.insert("alpha".to_string()));
        assert!(set.insert("beta".to_string()));
        assert!(!set.insert("alpha".to_string()));
        assert_eq!(set.len(), 2);

        // &str lookups against a String-keyed set.
        assert!(set.contains("alpha"));
        assert!(set.contains("beta"));
        assert!(!set.contains("gamma"));

        assert!(set.remove("alpha"));
        assert!(!set.remove("alpha"));
        assert_eq!(set.len(), 1);
        set.check_invariants();
    }

    #[test]
    fn displacement_keeps_chains_ordered() {
        let mut set: Set<u64> = Set::builder().expected_elements(5000).build();
        assert_eq!(set.slots_for_testing(), 8192);

        // A long chain on one slot interleaved with scattered keys.
        let mut chain = Vec::new();
        let mut candidate = 1u64;
        while chain.len() < 400 {
            if set.slot_of_for_testing(&candidate) == 4000 {
                chain.push(candidate);
            }
            candidate += 1;
        }
        for (n, key) in chain.iter().enumerate() {
            assert!(set.insert(*key));
            if n % 50 == 0 {
                set.check_invariants();
            }
        }
        for key in 10_000_000..10_000_500u64 {
            set.insert(key);
        }
        set.check_invariants();

        for key in chain.iter() {
            assert!(set.contains(key));
        }

        // Remove the chain; the scattered keys survive.
        for key in chain.iter() {
            assert!(set.remove(key));
        }
        assert_eq!(set.len(), 500);
        set.check_invariants();
    }

    #[test]
    fn growth_preserves_all_keys() {
        let mut set: Set<u64> = Set::new();
        let initial_slots = set.slots_for_testing();
        for key in 0..2000u64 {
            assert!(set.insert(key));
        }
        assert!(set.slots_for_testing() > initial_slots);
        assert_eq!(set.len(), 2000);
        for key in 0..2000u64 {
            assert!(set.contains(&key));
        }
        set.check_invariants();
    }

    #[test]
    fn no_reallocation_below_expected_elements() {
        let mut set: Set<u64> = Set::builder().expected_elements(1000).build();
        let slots = set.slots_for_testing();
        for key in 0..1000u64 {
            set.insert(key);
        }
        assert_eq!(set.slots_for_testing(), slots);
        set.check_invariants();
    }

    #[test]
    fn remove_if_and_retain() {
        let mut set: Set<u64> = (0..100u64).collect();
        let removed = set.remove_if(|key| *key % 2 == 0);
        assert_eq!(removed, 50);
        assert_eq!(set.len(), 50);

        let removed = set.retain(|key| *key < 21);
        assert_eq!(removed, 40);
        assert_eq!(set.len(), 10);
        set.check_invariants();
    }

    #[test]
    fn remove_if_panic_leaves_set_consistent() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut set: Set<u64> = (0..=9u64).collect();

        let result = catch_unwind(AssertUnwindSafe(|| {
            set.remove_if(|key| {
                if *key == 7 {
                    panic!("predicate failure on 7");
                }
                *key == 2 || *key == 5
            });
        }));
        assert!(result.is_err());

        assert!(set.contains(&7));
        for key in 0..=9u64 {
            if !set.contains(&key) {
                assert!(key == 2 || key == 5);
            }
        }
        set.check_invariants();
    }

    #[test]
    fn set_algebra() {
        let mut set: Set<u32> = (1..=20u32).collect();
        let other: Set<u32> = (1..=5u32).collect();

        assert_eq!(set.remove_all(&other), 5);
        assert_eq!(set.len(), 15);

        let keep: Set<u32> = (10..=30u32).collect();
        assert_eq!(set.retain_all(&keep), 4); // 6..=9 go
        assert_eq!(set.len(), 11);
        set.check_invariants();
    }

    #[test]
    fn equality_and_hash_are_order_and_hasher_independent() {
        let mut a: Set<String> = Set::new();
        let mut b: Set<String> = Set::builder().expected_elements(64).build();
        for word in ["one", "two", "three", "four"].iter() {
            a.insert(word.to_string());
        }
        for word in ["four", "three", "two", "one"].iter() {
            b.insert(word.to_string());
        }

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        b.remove("two");
        assert_ne!(a, b);
    }

    #[test]
    fn clone_diverges_but_compares_equal() {
        let mut a: Set<u64> = Set::new();
        a.insert_all(vec![1, 2, 3]);

        let mut b = a.clone();
        assert_eq!(a, b);
        assert_ne!(
            a.perturbation_for_testing(),
            b.perturbation_for_testing()
        );

        assert!(!b.insert(2));
        b.insert(4);
        assert_eq!(a.len(), 3);
        assert!(!a.contains(&4));

        let mut from_a = a.to_vec();
        let mut from_b = b.to_vec();
        from_a.sort_unstable();
        from_b.sort_unstable();
        assert_eq!(from_a, vec![1, 2, 3]);
        assert_eq!(from_b, vec![1, 2, 3, 4]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut set: Set<u64> = Set::builder().expected_elements(500).build();
        set.insert_all(0..500u64);
        let slots = set.slots_for_testing();

        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.slots_for_testing(), slots);
        assert!(!set.contains(&7));

        set.insert(7);
        assert!(set.contains(&7));
        set.check_invariants();
    }

    #[test]
    fn custom_hasher() {
        use std::collections::hash_map::RandomState;

        let mut set: Set<u64, RandomState> = Set::builder()
            .expected_elements(16)
            .build_with_hasher(RandomState::new());
        set.insert(1);
        set.insert(2);
        assert!(set.contains(&1));
        assert!(set.contains(&2));
        assert!(!set.contains(&3));
        set.check_invariants();
    }
}
