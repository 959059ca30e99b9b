#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![deny(rustdoc::broken_intra_doc_links)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Linprobe provides open-addressed, linear-probing hash sets and maps
//! over power-of-two slot arrays, in two specializations:
//!
//! - [`direct`]: fixed-width keys (integers, `char`) stored directly in
//!   the slot array, with zero doubling as the empty-slot marker. No
//!   per-slot metadata at all; a zero key is still usable and lives in a
//!   dedicated off-band cell.
//! - [`robin`]: arbitrary `Hash + Eq` keys with Robin-Hood
//!   displacement and a cached ideal-slot array, which lets lookups bail
//!   out as soon as a probe has walked farther than the resident it is
//!   standing on.
//!
//! Both families share the same engine choices: removal back-shifts the
//! following cluster instead of leaving tombstones, growth re-inserts
//! the old slots in reverse index order, every container mixes a
//! per-instance perturbation seed into its hashes so adversarial
//! collision chains do not carry over between containers, and iteration
//! cursors are recycled through a small per-container pool.
//!
//! All containers are single-threaded: nothing here takes a lock or
//! issues a fence, and the types are deliberately not `Sync`.
//!
//! # Examples
//!
//! ```rust
//! use linprobe::direct::Set;
//!
//! let mut seen: Set<u64> = Set::with_expected_elements(1024);
//! seen.insert(7);
//! seen.insert(0); // zero is an ordinary member
//!
//! assert!(seen.contains(7));
//! assert_eq!(seen.len(), 2);
//! ```
//!
//! ```rust
//! use linprobe::robin::Map;
//!
//! let mut counts: Map<String, u64> = Map::new();
//! counts.add_to("hits".to_string(), 1);
//! counts.add_to("hits".to_string(), 1);
//!
//! assert_eq!(counts.get("hits"), Some(&2));
//! ```
//!
//! # Minimum Supported Rust Version
//!
//! This crate's minimum supported Rust version (MSRV) is Rust 1.76.0.
//! Increasing MSRV is _not_ considered a semver-breaking change.

pub(crate) mod common;
pub mod direct;
pub mod robin;

#[cfg(doctest)]
mod doctests {
    // https://doc.rust-lang.org/rustdoc/write-documentation/documentation-tests.html#include-items-only-when-collecting-doctests
    #[doc = include_str!("../README.md")]
    struct ReadMeDoctests;
}
