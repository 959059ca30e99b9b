//! Internal machinery shared by the `direct` and `robin` container
//! families: hash mixing and per-instance seeds, slot-array sizing, and
//! the cursor recycling pool.

pub(crate) mod capacity;
pub(crate) mod hash;
pub(crate) mod pool;
