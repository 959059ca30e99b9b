//! Hash containers for fixed-width keys stored directly in the slot
//! array, with zero reserved as the empty-slot marker.
//!
//! Because the marker doubles as the occupancy signal, these containers
//! carry no per-slot metadata at all: a [`Set<K>`][set-struct] is one flat
//! key array, a [`Map<K, V>`][map-struct] adds one parallel value array.
//! Zero is still a perfectly valid key; a container that holds it keeps
//! it in a dedicated off-band cell instead of the slot array.
//!
//! Probing is plain linear probing. Keys whose distribution is hostile to
//! that (long common prefixes, adversarial streams) are decorrelated by
//! the per-instance perturbation seed mixed into every hash; keys that
//! need a user-supplied hash function belong in the [`robin`][robin-mod]
//! family instead.
//!
//! [set-struct]: ./struct.Set.html
//! [map-struct]: ./struct.Map.html
//! [robin-mod]: ../robin/index.html

mod builder;
mod iter;
mod map;
mod set;

pub use builder::{MapBuilder, SetBuilder};
pub use iter::{Keys, MapIter, SetIter, Values};
pub use map::{Map, OccupiedEntry};
pub use set::Set;

/// A fixed-width key that can live directly in a slot array.
///
/// `EMPTY` (zero for every provided implementation) marks unoccupied
/// slots, and `to_word` widens the key into the value fed to the hash
/// mixer. Implementations are provided for the built-in integer types and
/// `char`.
pub trait DirectKey: Copy + Eq {
    /// The key value reserved in slot arrays to mean "empty".
    const EMPTY: Self;

    /// The key as a 64-bit word for hashing. Identity-width: the mixer is
    /// responsible for all scrambling.
    fn to_word(self) -> u64;
}

macro_rules! impl_direct_key {
    ($($t:ty),*) => {
        $(
            impl DirectKey for $t {
                const EMPTY: Self = 0;

                #[inline]
                fn to_word(self) -> u64 {
                    self as u64
                }
            }
        )*
    };
}

impl_direct_key!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl DirectKey for char {
    const EMPTY: Self = '\0';

    #[inline]
    fn to_word(self) -> u64 {
        self as u64
    }
}
