//! Hash containers for arbitrary `Hash + Eq` keys, using Robin-Hood
//! displacement.
//!
//! Slots hold `Option<K>`, so occupancy needs no reserved key value and
//! every key in the type's domain is an ordinary member. Each occupied
//! slot additionally caches its occupant's *ideal* slot (`hash & mask`),
//! which serves two jobs: computing probe distances without re-hashing,
//! and letting lookups stop early, because once a probe has walked
//! farther from its ideal slot than the resident it is standing on, the
//! key cannot be present. That early exit is what pins worst-case lookup
//! cost close to the mean.
//!
//! Insertion applies the Robin-Hood rule: a carried key that has probed
//! farther than a resident evicts it and the resident continues down the
//! chain. Removal back-shifts, keeping probe paths hole-free without
//! tombstones.
//!
//! # Hashing
//!
//! By default these containers hash with [`aHash`][ahash-crate] through a
//! per-instance random state, then scramble the result with a
//! perturbation seed unique to the container. A custom
//! [`BuildHasher`][std-build-hasher] is installed with the builders'
//! `build_with_hasher`.
//!
//! [ahash-crate]: https://crates.io/crates/ahash
//! [std-build-hasher]: https://doc.rust-lang.org/std/hash/trait.BuildHasher.html

mod builder;
mod iter;
mod map;
mod set;

pub use builder::{MapBuilder, SetBuilder};
pub use iter::{Keys, MapIter, SetIter, Values};
pub use map::{Map, OccupiedEntry};
pub use set::Set;

/// The hasher state used when no explicit `BuildHasher` is supplied.
pub use ahash::RandomState as DefaultHashBuilder;
