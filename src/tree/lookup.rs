//! Filepath: src/tree/lookup.rs
//!
//! Lock-free point queries.
//!
//! A lookup descends byte by byte, letting path-compressed nodes steer the
//! cursor: when the probed key falls outside a compressed prefix the cursor
//! is rewritten to all-ones or all-zeroes so the rest of the descent tracks
//! the nearest existing leaf instead of the absent exact key. Nearest-
//! neighbor probes inside each node do the same per edge byte. The leaf the
//! descent lands on is then classified against the query point.
//!
//! The descent takes no locks. Each node probe already re-validates the
//! fetched child against its edge byte; a node caught with no visible child
//! at all sends the whole descent back to the root.

use seize::LocalGuard;

use crate::key::{byte_at, check_prefix, in_bounds, low_bits, PrefixCmp};
use crate::leaf::{leaf_from_node, Payload, RangeLeaf};
use crate::node::{NodeHeader, NodeRef, RangeHit};
use crate::tree::{LeafRef, RangeArt};
use crate::tracing_helpers::trace_log;

/// A resolved point query.
#[derive(Clone, Copy)]
pub enum Lookup<'g, P> {
    /// A range starts exactly at the queried offset.
    Match(LeafRef<'g, P>),
    /// A range starting before the offset covers it.
    Prev(LeafRef<'g, P>),
    /// No range covers the offset; this is the first one past it.
    Next(LeafRef<'g, P>),
}

impl<P: Payload + std::fmt::Debug> std::fmt::Debug for Lookup<'_, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match(leaf) => f.debug_tuple("Match").field(leaf).finish(),
            Self::Prev(leaf) => f.debug_tuple("Prev").field(leaf).finish(),
            Self::Next(leaf) => f.debug_tuple("Next").field(leaf).finish(),
        }
    }
}

/// Why a lookup produced no leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// The queried offset does not fit the 40-bit keyspace.
    OutOfBounds,
    /// The tree holds no leaf to answer with.
    NotFound,
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "offset beyond the 40-bit keyspace"),
            Self::NotFound => write!(f, "no range indexed"),
        }
    }
}

impl std::error::Error for LookupError {}

impl<P: Payload> RangeArt<P> {
    /// Find the range covering `index`, or its nearest neighbor.
    ///
    /// The returned leaf stays readable for the lifetime of `guard`, though
    /// a concurrent writer may trim or unlink it at any point after the
    /// classification; callers needing stability serialize externally.
    pub fn lookup<'g>(
        &self,
        index: u64,
        guard: &'g LocalGuard<'_>,
    ) -> Result<Lookup<'g, P>, LookupError> {
        let _ = guard;
        if !in_bounds(index) {
            return Err(LookupError::OutOfBounds);
        }

        loop {
            let root = self.root_node();
            if root.is_null() {
                return Err(LookupError::NotFound);
            }
            let Some(leaf) = self.descend_nearest(root, index) else {
                trace_log!("lookup restart: torn descent at index {index}");
                continue;
            };
            return classify(leaf, index);
        }
    }

    /// Walk from `root` to the leaf nearest `index`.
    ///
    /// `None` means a node was caught in a torn state and the caller must
    /// restart from the root.
    fn descend_nearest(&self, root: *mut NodeHeader, index: u64) -> Option<*mut RangeLeaf<P>> {
        let mut node = NodeRef::from_raw(root);
        let mut cursor = index;
        let mut level: u8 = 0;

        loop {
            if node.is_leaf() {
                // SAFETY: leaves of this tree are RangeLeaf<P>.
                return Some(unsafe { leaf_from_node::<P>(node.as_ptr()) });
            }

            if level != node.level() {
                // Compressed path: steer the cursor toward the nearest key
                // the subtree can hold when the prefix does not match.
                match check_prefix(cursor, node.offset(), level, node.level()) {
                    PrefixCmp::Match => cursor = low_bits(cursor, node.level()),
                    PrefixCmp::Prev => cursor = low_bits(u64::MAX, node.level()),
                    PrefixCmp::Next => cursor = 0,
                }
                level = node.level();
            }

            let (hit, child) = node.child_range(byte_at(cursor, level))?;
            level += 1;
            match hit {
                RangeHit::Match => cursor = low_bits(cursor, level),
                RangeHit::Prev => cursor = low_bits(u64::MAX, level),
                RangeHit::Next => cursor = 0,
            }
            node = child;
        }
    }

}

/// Classify the leaf a descent landed on against the query point.
///
/// A leaf at or past the point answers directly. A leaf below the point
/// answers only if it covers it; otherwise its list successor is the first
/// range past the point, unless that is the tail sentinel.
fn classify<'g, P: Payload>(
    leaf: *mut RangeLeaf<P>,
    index: u64,
) -> Result<Lookup<'g, P>, LookupError> {
    // SAFETY: reached through the tree under the caller's guard.
    let leaf_ref = unsafe { &*leaf };
    let offset = leaf_ref.offset();

    if offset == index {
        return Ok(Lookup::Match(LeafRef::new(leaf)));
    }
    if offset > index {
        return Ok(Lookup::Next(LeafRef::new(leaf)));
    }
    if leaf_ref.end() > index {
        return Ok(Lookup::Prev(LeafRef::new(leaf)));
    }

    let next = leaf_ref.next_ptr();
    // SAFETY: list successors stay readable under the guard.
    if next.is_null() || unsafe { (*next).is_sentinel() } {
        return Err(LookupError::NotFound);
    }
    Ok(Lookup::Next(LeafRef::new(next)))
}
