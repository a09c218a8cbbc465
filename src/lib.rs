//! # `RangeArt`
//!
//! A concurrent adaptive radix tree indexing byte ranges by offset.
//!
//! This crate implements an ART over a 40-bit keyspace of byte offsets:
//! - Adaptive interior nodes (4, 16, 48, 256 slots) with path compression
//! - One leaf per indexed range `[offset, offset + length)`, chained in a
//!   sorted doubly-linked list between two sentinels
//! - Optimistic lock coupling: readers take no locks, writers lock only
//!   the nodes they mutate and restart on conflict
//!
//! Point queries answer with the range covering the offset or, when none
//! does, its nearest neighbor on either side. Inserts win overlaps: a new
//! range trims or evicts whatever older ranges it covers, and a covered
//! tail survives with its payload advanced.
//!
//! ## Thread Safety
//!
//! `RangeArt<P>` is `Send + Sync`. All operations go through a guard that
//! pins memory reclamation:
//!
//! ```rust
//! use rangeart::{Lookup, RangeArt};
//!
//! let tree: RangeArt<u64> = RangeArt::new();
//! let guard = tree.guard();
//!
//! // Index [4096, 4608) under payload 7, transaction 1.
//! tree.insert(4096, 512, 7, 1, &guard);
//!
//! // Point query inside the range: covered by a range starting before.
//! match tree.lookup(4100, &guard) {
//!     Ok(Lookup::Prev(leaf)) => assert_eq!(leaf.payload(), 7),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```
//!
//! ## Key Constraints
//!
//! - Offsets must be below `2^40`; `insert` treats larger offsets as a
//!   caller bug, `lookup` reports them as out of bounds.
//! - Ranges may be zero-length; such point entries never trim neighbors.

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// We use extensive benchmarking to verify #[inline(always)] placement is correct.
#![allow(clippy::inline_always)]

pub mod bitmap;
pub mod key;
pub mod leaf;
pub mod link;
pub mod node;
pub mod ordering;
pub mod reclaim;
pub mod scan;
pub mod tracing_helpers;
pub mod tree;
pub mod version;

// Re-export main types for convenience
pub use leaf::Payload;
pub use tree::{LeafRef, Lookup, LookupError, RangeArt};
