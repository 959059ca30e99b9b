use super::{DirectKey, SetBuilder, SetIter};
use crate::common::{capacity, hash, pool::CursorPool};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;

/// A hash set of fixed-width keys over one flat, power-of-two slot array.
///
/// Slots are probed linearly; a key equal to [`DirectKey::EMPTY`] is held
/// in an off-band cell so the zero value stays usable as an ordinary set
/// member. Removal back-shifts the following cluster instead of leaving
/// tombstones, so lookups never scan dead slots.
///
/// # Examples
///
/// ```rust
/// use linprobe::direct::Set;
///
/// let mut primes: Set<u32> = Set::new();
/// for p in [2u32, 3, 5, 7, 11].iter() {
///     primes.insert(*p);
/// }
///
/// assert!(primes.contains(7));
/// assert!(!primes.contains(9));
/// assert_eq!(primes.len(), 5);
///
/// primes.remove(2);
/// assert_eq!(primes.len(), 4);
/// ```
///
/// # Hashing
///
/// Keys hash through a 64-bit avalanche mixer seeded with a perturbation
/// unique to this instance, so two sets fed the same keys probe along
/// unrelated slot sequences. The seed is fixed for the set's lifetime;
/// [`clone`][Clone::clone] draws a fresh one and re-inserts every element
/// rather than copying the slot array.
pub struct Set<K> {
    pub(crate) keys: Box<[K]>,
    pub(crate) assigned: usize,
    pub(crate) has_empty_key: bool,
    resize_at: usize,
    load_factor: f64,
    perturbation: u64,
    pub(crate) cursors: CursorPool,
}

impl<K> Set<K>
where
    K: DirectKey,
{
    /// Constructs an empty `Set<K>` with default sizing (eight expected
    /// elements, load factor 0.75).
    pub fn new() -> Self {
        Self::with_parameters(
            capacity::DEFAULT_EXPECTED_ELEMENTS,
            capacity::DEFAULT_LOAD_FACTOR,
        )
    }

    /// Constructs an empty `Set<K>` sized so that the first
    /// `expected_elements` distinct inserts perform no reallocation.
    pub fn with_expected_elements(expected_elements: usize) -> Self {
        Self::with_parameters(expected_elements, capacity::DEFAULT_LOAD_FACTOR)
    }

    /// Returns a [`SetBuilder`][builder-struct] for configuring expected
    /// elements and load factor.
    ///
    /// [builder-struct]: ./struct.SetBuilder.html
    pub fn builder() -> SetBuilder<K> {
        SetBuilder::default()
    }

    pub(crate) fn with_parameters(expected_elements: usize, load_factor: f64) -> Self {
        capacity::check_load_factor(load_factor);
        let slots = capacity::minimum_slots(expected_elements, load_factor);

        Self {
            keys: vec![K::EMPTY; slots].into_boxed_slice(),
            assigned: 0,
            has_empty_key: false,
            resize_at: capacity::expand_at(slots, load_factor),
            load_factor,
            perturbation: hash::new_perturbation(),
            cursors: CursorPool::new(),
        }
    }
}

//
// public
//
impl<K> Set<K>
where
    K: DirectKey,
{
    /// Adds `key` to the set. Returns `true` if the key was not already
    /// present.
    pub fn insert(&mut self, key: K) -> bool {
        if key == K::EMPTY {
            let added = !self.has_empty_key;
            self.has_empty_key = true;
            return added;
        }

        let mask = self.mask();
        let mut slot = self.slot_of(key);
        while self.keys[slot] != K::EMPTY {
            if self.keys[slot] == key {
                return false;
            }
            slot = (slot + 1) & mask;
        }

        if self.assigned == self.resize_at {
            self.grow_and_insert(slot, key);
        } else {
            self.keys[slot] = key;
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

    pub fn contains(&self, key: K) -> bool {
        if key == K::EMPTY {
            return self.has_empty_key;
        }
        self.find_slot(key).is_some()
    }

    /// Removes `key`, back-shifting the probe cluster behind it. Returns
    /// `true` if the key was present.
    pub fn remove(&mut self, key: K) -> bool {
        if key == K::EMPTY {
            let removed = self.has_empty_key;
            self.has_empty_key = false;
            return removed;
        }
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
    pub fn remove_if(&mut self, mut predicate: impl FnMut(K) -> bool) -> usize {
        let before = self.len();

        if self.has_empty_key && predicate(K::EMPTY) {
            self.has_empty_key = false;
        }

        let mut slot = 0;
        while slot < self.keys.len() {
            let key = self.keys[slot];
            if key != K::EMPTY && predicate(key) {
                // The back-shift may have dropped another live key into
                // this slot; re-examine it before moving on.
                self.shift_conflicting_keys(slot);
            } else {
                slot += 1;
            }
        }

        before - self.len()
    }

    /// Keeps only the keys for which `predicate` returns `true`,
    /// returning the number removed.
    pub fn retain(&mut self, mut predicate: impl FnMut(K) -> bool) -> usize {
        self.remove_if(move |key| !predicate(key))
    }

    /// Removes every key present in `other`, returning the number
    /// removed.
    pub fn remove_all(&mut self, other: &Set<K>) -> usize {
        if other.len() < self.len() {
            // Cheaper to probe for each of the other set's keys than to
            // scan every slot of this one.
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
    pub fn retain_all(&mut self, other: &Set<K>) -> usize {
        self.remove_if(|key| !other.contains(key))
    }

    /// Removes all keys. Keeps the allocated slot array.
    pub fn clear(&mut self) {
        for slot in self.keys.iter_mut() {
            *slot = K::EMPTY;
        }
        self.assigned = 0;
        self.has_empty_key = false;
    }

    pub fn len(&self) -> usize {
        self.assigned + self.has_empty_key as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements this set can hold before its next reallocation.
    pub fn capacity(&self) -> usize {
        self.resize_at
    }

    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Visits all keys in arbitrary order (decreasing slot index, then
    /// the off-band zero key if present). The element type is `K`.
    pub fn iter(&self) -> SetIter<'_, K> {
        SetIter::new(self)
    }

    /// Copies the keys into a fresh `Vec`, in iteration order.
    pub fn to_vec(&self) -> Vec<K> {
        self.iter().collect()
    }
}

//
// private
//
impl<K> Set<K>
where
    K: DirectKey,
{
    #[inline]
    fn mask(&self) -> usize {
        self.keys.len() - 1
    }

    #[inline]
    fn slot_of(&self, key: K) -> usize {
        hash::mix64(key.to_word() ^ self.perturbation) as usize & self.mask()
    }

    /// Slot holding `key`, or `None`. `key` must not be the empty marker.
    fn find_slot(&self, key: K) -> Option<usize> {
        let mask = self.mask();
        let mut slot = self.slot_of(key);
        loop {
            let existing = self.keys[slot];
            if existing == K::EMPTY {
                return None;
            }
            if existing == key {
                return Some(slot);
            }
            slot = (slot + 1) & mask;
        }
    }

    /// Closes the gap at `gap` by pulling back every following occupant
    /// whose ideal slot lies at or before the gap, then blanks the final
    /// gap. Keeps every surviving key's probe path hole-free.
    fn shift_conflicting_keys(&mut self, mut gap: usize) {
        let mask = self.mask();
        let mut distance = 0;
        loop {
            distance += 1;
            let slot = (gap + distance) & mask;
            let key = self.keys[slot];
            if key == K::EMPTY {
                break;
            }
            let shift = slot.wrapping_sub(self.slot_of(key)) & mask;
            if shift >= distance {
                self.keys[gap] = key;
                gap = slot;
                distance = 0;
            }
        }
        self.keys[gap] = K::EMPTY;
        self.assigned -= 1;
    }

    /// Doubles the slot array and re-inserts everything, including the
    /// key that triggered the growth. New buffers are allocated before
    /// any state changes.
    fn grow_and_insert(&mut self, free_slot: usize, pending: K) {
        let new_slots = capacity::next_slots(self.keys.len(), self.assigned);
        let new_keys = vec![K::EMPTY; new_slots].into_boxed_slice();

        let mut old_keys = mem::replace(&mut self.keys, new_keys);
        self.resize_at = capacity::expand_at(new_slots, self.load_factor);
        old_keys[free_slot] = pending;

        // Reverse slot order: keys that displaced others go back in
        // first, which keeps transient probe chains short while the new
        // table fills.
        for slot in (0..old_keys.len()).rev() {
            let key = old_keys[slot];
            if key != K::EMPTY {
                self.rehash_insert(key);
            }
        }
    }

    /// Insert during a rehash: every key is known distinct, so no
    /// equality checks.
    fn rehash_insert(&mut self, key: K) {
        let mask = self.mask();
        let mut slot = self.slot_of(key);
        while self.keys[slot] != K::EMPTY {
            slot = (slot + 1) & mask;
        }
        self.keys[slot] = key;
    }
}

impl<K> Default for Set<K>
where
    K: DirectKey,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for Set<K>
where
    K: DirectKey,
{
    /// The clone draws a fresh perturbation seed, so it must re-insert
    /// every element instead of copying the slot array; equal contents,
    /// generally different slot layout.
    fn clone(&self) -> Self {
        let mut clone = Self::with_parameters(self.len(), self.load_factor);
        for key in self.iter() {
            clone.insert(key);
        }
        clone
    }
}

impl<K> PartialEq for Set<K>
where
    K: DirectKey,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|key| other.contains(key))
    }
}

impl<K> Eq for Set<K> where K: DirectKey {}

impl<K> Hash for Set<K>
where
    K: DirectKey,
{
    /// Order-independent: a wrapping sum of the per-key mixed hashes,
    /// with a fixed summand for the off-band zero key. Independent of the
    /// per-instance perturbation, so equal sets hash equal.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut acc = 0u64;
        for key in self.keys.iter() {
            if *key != K::EMPTY {
                acc = acc.wrapping_add(hash::mix64(key.to_word()));
            }
        }
        if self.has_empty_key {
            acc = acc.wrapping_add(hash::EMPTY_KEY_FOLD);
        }
        state.write_u64(acc);
    }
}

impl<K> fmt::Debug for Set<K>
where
    K: DirectKey + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K> Extend<K> for Set<K>
where
    K: DirectKey,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, keys: I) {
        self.insert_all(keys);
    }
}

impl<K> std::iter::FromIterator<K> for Set<K>
where
    K: DirectKey,
{
    fn from_iter<I: IntoIterator<Item = K>>(keys: I) -> Self {
        let mut set = Self::new();
        set.insert_all(keys);
        set
    }
}

impl<'a, K> IntoIterator for &'a Set<K>
where
    K: DirectKey,
{
    type Item = K;
    type IntoIter = SetIter<'a, K>;

    fn into_iter(self) -> SetIter<'a, K> {
        self.iter()
    }
}

//
// for testing
//
#[cfg(test)]
impl<K> Set<K>
where
    K: DirectKey + fmt::Debug,
{
    pub(crate) fn slots_for_testing(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn perturbation_for_testing(&self) -> u64 {
        self.perturbation
    }

    pub(crate) fn slot_of_for_testing(&self, key: K) -> usize {
        self.slot_of(key)
    }

    /// Asserts the structural invariants: power-of-two slot count, an
    /// accurate assigned count, at least one empty slot, and a hole-free
    /// probe path from every key's ideal slot to its current one.
    pub(crate) fn check_invariants(&self) {
        assert!(self.keys.len().is_power_of_two());
        assert!(self.assigned < self.keys.len());
        assert!(self.assigned <= self.resize_at);

        let mask = self.mask();
        let mut live = 0;
        for slot in 0..self.keys.len() {
            let key = self.keys[slot];
            if key == K::EMPTY {
                continue;
            }
            live += 1;
            let mut probe = self.slot_of(key);
            while probe != slot {
                assert_ne!(
                    self.keys[probe],
                    K::EMPTY,
                    "hole in probe path of {:?}",
                    key
                );
                probe = (probe + 1) & mask;
            }
        }
        assert_eq!(live, self.assigned);
    }
}

// To see the debug prints, run test as `cargo test -- --nocapture`
#[cfg(test)]
mod tests {
    use super::Set;

    fn hash_of(set: &Set<u64>) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    /// Deterministic pseudo-random stream for bulk tests.
    fn xorshift(state: &mut u64) -> u64 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }

    /// Keys whose perturbed hash lands on `target_slot` in this set.
    fn colliding_keys(set: &Set<u64>, target_slot: usize, count: usize) -> Vec<u64> {
        let mut keys = Vec::with_capacity(count);
        let mut candidate = 1u64;
        while keys.len() < count {
            if set.slot_of_for_testing(candidate) == target_slot {
                keys.push(candidate);
            }
            candidate += 1;
        }
        keys
    }

    #[test]
    fn empty_and_zero_key() {
        let mut set: Set<u64> = Set::new();
        assert!(set.is_empty());
        assert!(!set.contains(0));

        assert!(set.insert(0));
        assert_eq!(set.len(), 1);
        assert!(set.contains(0));
        assert!(!set.insert(0));
        assert_eq!(set.len(), 1);

        assert!(set.remove(0));
        assert_eq!(set.len(), 0);
        assert!(!set.remove(0));
        set.check_invariants();
    }

    #[test]
    fn insert_contains_remove() {
        let mut set: Set<u32> = Set::new();
        for key in 1..=100u32 {
            assert!(set.insert(key));
        }
        assert_eq!(set.len(), 100);
        for key in 1..=100u32 {
            assert!(set.contains(key));
            assert!(!set.insert(key));
        }
        set.check_invariants();

        for key in (1..=100u32).step_by(2) {
            assert!(set.remove(key));
        }
        assert_eq!(set.len(), 50);
        for key in 1..=100u32 {
            assert_eq!(set.contains(key), key % 2 == 0);
        }
        set.check_invariants();
    }

    #[test]
    fn collision_chain_insert_and_remove() {
        // 8192 slots at the default load factor.
        let mut set: Set<u64> = Set::builder().expected_elements(5000).build();
        assert_eq!(set.slots_for_testing(), 8192);

        let keys = colliding_keys(&set, 77, 683);
        for (n, key) in keys.iter().enumerate() {
            assert!(set.insert(*key));
            assert_eq!(set.len(), n + 1);
        }
        for key in keys.iter() {
            assert!(set.contains(*key));
        }
        set.check_invariants();

        // Delete in insertion order; the cluster back-shifts each time.
        for (n, key) in keys.iter().enumerate() {
            assert!(set.remove(*key));
            assert_eq!(set.len(), keys.len() - n - 1);
        }
        assert_eq!(set.len(), 0);
        set.check_invariants();
    }

    #[test]
    fn collision_chain_mixed_with_random_keys() {
        let mut set: Set<u64> = Set::builder().expected_elements(5000).build();
        let chain = colliding_keys(&set, 123, 683);
        set.insert_all(chain.iter().copied());

        let mut state = 0x1234_5678_9abc_def0u64;
        let mut random = Vec::new();
        while random.len() < 500 {
            let key = xorshift(&mut state);
            if key != 0 && set.insert(key) {
                random.push(key);
            }
        }
        assert_eq!(set.len(), 683 + 500);

        for key in random.iter() {
            assert!(set.contains(*key));
        }
        for key in chain.iter() {
            set.remove(*key);
        }
        assert_eq!(set.len(), 500);
        for key in random.iter() {
            assert!(set.contains(*key));
        }
        set.check_invariants();
    }

    #[test]
    fn full_load_factor_edge() {
        let mut set: Set<u64> = Set::builder()
            .expected_elements(127)
            .load_factor(1.0)
            .build();
        assert_eq!(set.slots_for_testing(), 128);
        assert_eq!(set.capacity(), 127);

        for key in 1..=126u64 {
            assert!(set.insert(key));
        }
        assert_eq!(set.slots_for_testing(), 128);

        // Re-adding a present key never grows.
        assert!(!set.insert(64));
        assert_eq!(set.slots_for_testing(), 128);

        // The 127th key fills the table to its threshold without
        // growing; one slot stays empty.
        assert!(set.insert(127));
        assert_eq!(set.len(), 127);
        assert_eq!(set.slots_for_testing(), 128);

        // The 128th distinct key triggers the doubling.
        assert!(set.insert(128));
        assert_eq!(set.slots_for_testing(), 256);
        assert_eq!(set.capacity(), 255);
        for key in 1..=128u64 {
            assert!(set.contains(key));
        }
        set.check_invariants();
    }

    #[test]
    fn no_reallocation_below_expected_elements() {
        let mut set: Set<u64> = Set::builder().expected_elements(1000).build();
        let slots = set.slots_for_testing();
        for key in 1..=1000u64 {
            set.insert(key);
        }
        assert_eq!(set.slots_for_testing(), slots);

        set.insert(1001);
        set.check_invariants();
    }

    #[test]
    fn remove_if_counts_and_reexamines_shifted_slots() {
        let mut set: Set<u64> = Set::builder().expected_elements(5000).build();
        let chain = colliding_keys(&set, 9, 100);
        set.insert_all(chain.iter().copied());
        set.insert(0);

        // Every other chain key, plus the off-band zero key.
        let doomed: Vec<u64> = chain.iter().copied().step_by(2).collect();
        let removed = set.remove_if(|key| key == 0 || doomed.contains(&key));
        assert_eq!(removed, doomed.len() + 1);
        assert_eq!(set.len(), 100 - doomed.len());
        for key in chain.iter() {
            assert_eq!(set.contains(*key), !doomed.contains(key));
        }
        set.check_invariants();
    }

    #[test]
    fn remove_if_panic_leaves_set_consistent() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut set: Set<u64> = Set::new();
        set.insert_all(0..=9u64);

        let result = catch_unwind(AssertUnwindSafe(|| {
            set.remove_if(|key| {
                if key == 7 {
                    panic!("predicate failure on 7");
                }
                key == 2 || key == 5
            });
        }));
        assert!(result.is_err());

        // 7 survives; everything absent was one of the predicate's
        // targets; the table is still structurally sound.
        assert!(set.contains(7));
        for key in 0..=9u64 {
            if !set.contains(key) {
                assert!(key == 2 || key == 5);
            }
        }
        set.check_invariants();
    }

    #[test]
    fn retain_and_set_algebra() {
        let mut set: Set<u32> = (1..=20u32).collect();
        let removed = set.retain(|key| key % 2 == 0);
        assert_eq!(removed, 10);
        assert_eq!(set.len(), 10);

        let other: Set<u32> = (1..=6u32).collect();
        let removed = set.remove_all(&other);
        assert_eq!(removed, 3); // 2, 4, 6
        assert_eq!(set.len(), 7);

        let keep: Set<u32> = (8..=12u32).collect();
        let removed = set.retain_all(&keep);
        assert_eq!(removed, 4);
        let mut kept = set.to_vec();
        kept.sort_unstable();
        assert_eq!(kept, vec![8, 10, 12]);
    }

    #[test]
    fn clear_keeps_allocation() {
        let mut set: Set<u64> = Set::builder().expected_elements(500).build();
        set.insert_all(1..=500u64);
        set.insert(0);
        let slots = set.slots_for_testing();

        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(0));
        assert_eq!(set.slots_for_testing(), slots);

        set.insert(42);
        assert!(set.contains(42));
        set.check_invariants();
    }

    #[test]
    fn equality_and_hash_are_order_independent() {
        let mut a: Set<u64> = Set::new();
        let mut b: Set<u64> = Set::new();
        for key in 1..=50u64 {
            a.insert(key);
        }
        for key in (1..=50u64).rev() {
            b.insert(key);
        }
        a.insert(0);
        b.insert(0);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        b.remove(25);
        assert_ne!(a, b);
    }

    #[test]
    fn clone_diverges_but_compares_equal() {
        let mut a: Set<u64> = Set::new();
        a.insert_all(vec![1, 2, 3]);

        let mut b = a.clone();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(
            a.perturbation_for_testing(),
            b.perturbation_for_testing()
        );

        // Inserting an already-present key changes nothing.
        assert!(!b.insert(2));
        assert_eq!(a, b);

        // Mutating the clone leaves the source untouched.
        b.insert(4);
        assert_eq!(a.len(), 3);
        assert!(!a.contains(4));

        let mut from_a = a.to_vec();
        let mut from_b = b.to_vec();
        from_a.sort_unstable();
        from_b.sort_unstable();
        assert_eq!(from_a, vec![1, 2, 3]);
        assert_eq!(from_b, vec![1, 2, 3, 4]);
    }

    #[test]
    fn round_trip_through_to_vec() {
        let mut set: Set<i32> = Set::new();
        set.insert_all(vec![-5, 0, 3, 19, 1024]);

        let rebuilt: Set<i32> = set.to_vec().into_iter().collect();
        assert_eq!(set, rebuilt);
    }

    #[test]
    fn signed_and_char_keys() {
        let mut signed: Set<i64> = Set::new();
        signed.insert(-1);
        signed.insert(i64::MIN);
        assert!(signed.contains(-1));
        assert!(signed.contains(i64::MIN));
        assert!(!signed.contains(1));

        let mut chars: Set<char> = Set::new();
        chars.insert('a');
        chars.insert('\0');
        assert!(chars.contains('a'));
        assert!(chars.contains('\0'));
        assert_eq!(chars.len(), 2);
    }
}
