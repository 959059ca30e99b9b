use super::{DirectKey, Map, Set};
use crate::common::capacity;

use std::marker::PhantomData;

/// Builds a [`Set`][set-struct] with various configuration knobs.
///
/// [set-struct]: ./struct.Set.html
///
/// # Examples
///
/// ```rust
/// use linprobe::direct::Set;
///
/// let mut set: Set<u64> = Set::builder()
///     // Room for 10,000 elements before the first reallocation.
///     .expected_elements(10_000)
///     .load_factor(0.9)
///     .build();
///
/// set.insert(42);
/// assert!(set.contains(42));
/// ```
#[must_use]
pub struct SetBuilder<K> {
    expected_elements: Option<usize>,
    load_factor: Option<f64>,
    _marker: PhantomData<K>,
}

impl<K> Default for SetBuilder<K>
where
    K: DirectKey,
{
    fn default() -> Self {
        Self {
            expected_elements: None,
            load_factor: None,
            _marker: PhantomData,
        }
    }
}

impl<K> SetBuilder<K>
where
    K: DirectKey,
{
    /// Sets how many distinct elements the set must absorb without
    /// reallocating.
    pub fn expected_elements(self, expected_elements: usize) -> Self {
        Self {
            expected_elements: Some(expected_elements),
            ..self
        }
    }

    /// Sets the load factor, in `(0, 1]`.
    pub fn load_factor(self, load_factor: f64) -> Self {
        Self {
            load_factor: Some(load_factor),
            ..self
        }
    }

    /// Builds a `Set<K>`.
    ///
    /// # Panics
    ///
    /// Panics if the load factor is outside `(0, 1]`.
    pub fn build(self) -> Set<K> {
        Set::with_parameters(
            self.expected_elements
                .unwrap_or(capacity::DEFAULT_EXPECTED_ELEMENTS),
            self.load_factor.unwrap_or(capacity::DEFAULT_LOAD_FACTOR),
        )
    }
}

/// Builds a [`Map`][map-struct] with various configuration knobs.
///
/// [map-struct]: ./struct.Map.html
#[must_use]
pub struct MapBuilder<K, V> {
    expected_elements: Option<usize>,
    load_factor: Option<f64>,
    _marker: PhantomData<(K, V)>,
}

impl<K, V> Default for MapBuilder<K, V>
where
    K: DirectKey,
{
    fn default() -> Self {
        Self {
            expected_elements: None,
            load_factor: None,
            _marker: PhantomData,
        }
    }
}

impl<K, V> MapBuilder<K, V>
where
    K: DirectKey,
{
    /// Sets how many distinct keys the map must absorb without
    /// reallocating.
    pub fn expected_elements(self, expected_elements: usize) -> Self {
        Self {
            expected_elements: Some(expected_elements),
            ..self
        }
    }

    /// Sets the load factor, in `(0, 1]`.
    pub fn load_factor(self, load_factor: f64) -> Self {
        Self {
            load_factor: Some(load_factor),
            ..self
        }
    }

    /// Builds a `Map<K, V>`.
    ///
    /// # Panics
    ///
    /// Panics if the load factor is outside `(0, 1]`.
    pub fn build(self) -> Map<K, V> {
        Map::with_parameters(
            self.expected_elements
                .unwrap_or(capacity::DEFAULT_EXPECTED_ELEMENTS),
            self.load_factor.unwrap_or(capacity::DEFAULT_LOAD_FACTOR),
        )
    }
}
