use super::{DefaultHashBuilder, Map, Set};
use crate::common::capacity;

use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

/// Builds a [`Set`][set-struct] with various configuration knobs.
///
/// [set-struct]: ./struct.Set.html
///
/// # Examples
///
/// ```rust
/// use linprobe::robin::Set;
///
/// let mut set: Set<String> = Set::builder()
///     .expected_elements(10_000)
///     .build();
///
/// set.insert("carrot".to_string());
/// assert!(set.contains("carrot"));
/// ```
#[must_use]
pub struct SetBuilder<K> {
    expected_elements: Option<usize>,
    load_factor: Option<f64>,
    _marker: PhantomData<K>,
}

impl<K> Default for SetBuilder<K>
where
    K: Hash + Eq,
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
    K: Hash + Eq,
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

    /// Builds a `Set<K>` hashing with [`DefaultHashBuilder`].
    ///
    /// [`DefaultHashBuilder`]: ../type.DefaultHashBuilder.html
    ///
    /// # Panics
    ///
    /// Panics if the load factor is outside `(0, 1]`.
    pub fn build(self) -> Set<K, DefaultHashBuilder> {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Builds a `Set<K, S>` with the given `build_hasher`.
    pub fn build_with_hasher<S>(self, build_hasher: S) -> Set<K, S>
    where
        S: BuildHasher,
    {
        Set::with_parameters(
            self.expected_elements
                .unwrap_or(capacity::DEFAULT_EXPECTED_ELEMENTS),
            self.load_factor.unwrap_or(capacity::DEFAULT_LOAD_FACTOR),
            build_hasher,
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
    K: Hash + Eq,
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
    K: Hash + Eq,
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

    /// Builds a `Map<K, V>` hashing with [`DefaultHashBuilder`].
    ///
    /// [`DefaultHashBuilder`]: ../type.DefaultHashBuilder.html
    ///
    /// # Panics
    ///
    /// Panics if the load factor is outside `(0, 1]`.
    pub fn build(self) -> Map<K, V, DefaultHashBuilder> {
        self.build_with_hasher(DefaultHashBuilder::default())
    }

    /// Builds a `Map<K, V, S>` with the given `build_hasher`.
    pub fn build_with_hasher<S>(self, build_hasher: S) -> Map<K, V, S>
    where
        S: BuildHasher,
    {
        Map::with_parameters(
            self.expected_elements
                .unwrap_or(capacity::DEFAULT_EXPECTED_ELEMENTS),
            self.load_factor.unwrap_or(capacity::DEFAULT_LOAD_FACTOR),
            build_hasher,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{MapBuilder, SetBuilder};

    #[test]
    fn build_set_with_knobs() {
        let mut set = SetBuilder::<String>::default()
            .expected_elements(64)
            .load_factor(0.5)
            .build();
        assert!(set.capacity() >= 64);
        assert_eq!(set.load_factor(), 0.5);

        set.insert("seven".to_string());
        assert!(set.contains("seven"));
    }

    #[test]
    fn build_map_with_custom_hasher() {
        use std::collections::hash_map::RandomState;

        let mut map = MapBuilder::<String, u64>::default()
            .build_with_hasher(RandomState::new());
        map.insert("one".to_string(), 1);
        assert_eq!(map.get("one"), Some(&1));
    }

    #[test]
    fn invalid_load_factor_panics_at_build() {
        use std::panic::catch_unwind;

        let result = catch_unwind(|| {
            SetBuilder::<u64>::default().load_factor(2.0).build()
        });
        assert!(result.is_err());

        let result = catch_unwind(|| {
            MapBuilder::<u64, u64>::default().load_factor(-1.0).build()
        });
        assert!(result.is_err());
    }
}
