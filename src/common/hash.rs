//! Hash mixing and per-container perturbation seeds.
//!
//! Every container draws a `u64` perturbation at construction and XORs it
//! into each raw key hash before masking. Two containers fed the same key
//! stream therefore probe along unrelated slot sequences, which keeps an
//! adversarial collision chain built against one instance from carrying
//! over to another.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// 64-bit avalanche finalizer (SplitMix64 constants). Maps zero to zero,
/// so callers that need a nonzero image must perturb the input first.
#[inline]
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

const SEQUENCE_STEP: u64 = 0x9e37_79b9_7f4a_7c15;

static PROCESS_SEED: Lazy<u64> = Lazy::new(|| {
    let mut bytes = [0u8; 8];
    // The sequence counter alone still separates instances if the OS
    // entropy source is unavailable.
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_ne_bytes(bytes),
        Err(_) => SEQUENCE_STEP,
    }
});

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Returns a fresh perturbation seed. Each call observes a distinct value
/// of the process-wide sequence counter, so no two containers (including
/// a container and its clone) share a seed.
pub(crate) fn new_perturbation() -> u64 {
    let n = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    mix64(*PROCESS_SEED ^ n.wrapping_mul(SEQUENCE_STEP))
}

/// Fixed-seed hasher state backing the order-independent container-level
/// `Hash` impls. Equal containers must hash equal even when their
/// per-instance strategies and perturbations differ, so this state is the
/// same for every container in every process.
pub(crate) fn fold_state() -> ahash::RandomState {
    ahash::RandomState::with_seeds(
        0x243f_6a88_85a3_08d3,
        0x1319_8a2e_0370_7344,
        0xa409_3822_299f_31d0,
        0x082e_fa98_ec4e_6c89,
    )
}

/// Fixed summand contributed by the off-band sentinel cell to a
/// container-level hash. `mix64` maps the sentinel key's zero word to
/// zero, so the cell needs an explicit nonzero image.
pub(crate) const EMPTY_KEY_FOLD: u64 = 0x9e37_79b9_7f4a_7c15;
