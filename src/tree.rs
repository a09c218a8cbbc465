//! Filepath: src/tree.rs
//!
//! The concurrent range index.
//!
//! [`RangeArt`] is an adaptive radix tree over a 40-bit keyspace of byte
//! offsets. Each leaf records one range `[offset, offset + length)`; leaves
//! are additionally chained in a sorted doubly-linked list between two
//! sentinels, so every point query can answer with the covering range or
//! its nearest neighbor.
//!
//! # Concurrency Model
//! 1. `guard = tree.guard()` pins an epoch; retired nodes stay readable
//!    until every guard that could have seen them is dropped.
//! 2. Lookups descend optimistically with no locks at all; torn reads are
//!    detected per node and answered by restarting from the root.
//! 3. Inserts and removes descend optimistically, then upgrade version
//!    snapshots to write locks on the one or two nodes they mutate
//!    (optimistic lock coupling). Any conflict restarts from the root.
//! 4. List surgery is guarded by per-leaf mutexes, locked in ascending
//!    offset order.
//!
//! The root pointer doubles as the lock for root replacement: writers mark
//! its low bit (see [`crate::link`]) via CAS and unmark it when the swing
//! is published.

mod insert;
mod lookup;
mod remove;

use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::AtomicPtr;

use seize::{Collector, LocalGuard};

use crate::leaf::{Payload, RangeLeaf};
use crate::link::{is_marked, mark_ptr, unmark_ptr};
use crate::node::{NodeHeader, NodeRef};
use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, WRITE_ORD};
use crate::reclaim;

pub use lookup::{Lookup, LookupError};

// ============================================================================
//  Public leaf handle
// ============================================================================

/// Borrowed view of a live leaf, valid for the lifetime of the guard it was
/// produced under.
pub struct LeafRef<'g, P> {
    ptr: *mut RangeLeaf<P>,
    _guard: PhantomData<&'g LocalGuard<'g>>,
}

impl<P> Clone for LeafRef<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for LeafRef<'_, P> {}

impl<'g, P: Payload> LeafRef<'g, P> {
    pub(crate) fn new(ptr: *mut RangeLeaf<P>) -> Self {
        Self {
            ptr,
            _guard: PhantomData,
        }
    }

    pub(crate) fn as_ptr(self) -> *mut RangeLeaf<P> {
        self.ptr
    }

    #[inline]
    fn leaf(&self) -> &'g RangeLeaf<P> {
        // SAFETY: the guard the lifetime is tied to keeps the leaf
        // allocation live even after a concurrent remove retires it.
        unsafe { &*self.ptr }
    }

    /// Range start.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.leaf().offset()
    }

    /// Range length in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.leaf().length()
    }

    /// One past the last byte of the range.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.leaf().end()
    }

    /// Attached payload.
    #[must_use]
    pub fn payload(&self) -> P {
        self.leaf().payload()
    }

    /// Transaction tag the range was inserted under.
    #[must_use]
    pub fn tx_id(&self) -> i32 {
        self.leaf().tx_id()
    }
}

impl<P: Payload + fmt::Debug> fmt::Debug for LeafRef<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafRef")
            .field("offset", &self.offset())
            .field("length", &self.length())
            .field("payload", &self.payload())
            .field("tx_id", &self.tx_id())
            .finish()
    }
}

// ============================================================================
//  Tree
// ============================================================================

/// Concurrent adaptive radix tree indexing byte ranges by 40-bit offset.
///
/// Overlap is resolved in favor of the newest insert: an incoming range
/// trims or evicts whatever part of older ranges it covers, and a covered
/// tail survives as a re-inserted remainder with its payload advanced by
/// [`Payload::offset_by`].
pub struct RangeArt<P: Payload> {
    collector: Collector,
    /// Root node, or null for an empty tree. Low bit is the root lock.
    root: AtomicPtr<NodeHeader>,
    head: Box<RangeLeaf<P>>,
    tail: Box<RangeLeaf<P>>,
}

// SAFETY: all shared state is atomics, version locks, and raw mutexes; P is
// Send + Sync by the Payload bound.
unsafe impl<P: Payload> Send for RangeArt<P> {}
// SAFETY: as above.
unsafe impl<P: Payload> Sync for RangeArt<P> {}

impl<P: Payload> RangeArt<P> {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        let head = RangeLeaf::sentinel();
        let tail = RangeLeaf::sentinel();
        head.set_next(ptr::from_ref(&*tail).cast_mut());
        tail.set_prev(ptr::from_ref(&*head).cast_mut());
        Self {
            collector: Collector::new(),
            root: AtomicPtr::new(ptr::null_mut()),
            head,
            tail,
        }
    }

    /// Enter a protected region and return a guard.
    ///
    /// The guard keeps any leaf reached during its lifetime readable even
    /// if a concurrent writer unlinks it. Every tree operation takes one.
    #[must_use]
    #[inline(always)]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Whether the tree holds no ranges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_node().is_null()
    }

    #[inline]
    pub(crate) fn head_ptr(&self) -> *mut RangeLeaf<P> {
        ptr::from_ref(&*self.head).cast_mut()
    }

    #[inline]
    pub(crate) fn tail_ptr(&self) -> *mut RangeLeaf<P> {
        ptr::from_ref(&*self.tail).cast_mut()
    }

    // ------------------------------------------------------------------------
    //  Root handle
    // ------------------------------------------------------------------------

    /// Current root with the lock bit stripped, or null.
    #[inline]
    pub(crate) fn root_node(&self) -> *mut NodeHeader {
        unmark_ptr(self.root.load(READ_ORD))
    }

    /// Try to lock the root handle against replacement.
    ///
    /// Fails when the root is already locked or no longer `expected`.
    ///
    /// # Returns
    /// `true` if the caller must restart, `false` with the root locked.
    #[must_use]
    pub(crate) fn root_lock_or_restart(&self, expected: *mut NodeHeader) -> bool {
        debug_assert!(!is_marked(expected));
        self.root
            .compare_exchange(expected, mark_ptr(expected), CAS_SUCCESS, CAS_FAILURE)
            .is_err()
    }

    /// Publish `new_root` and release the root lock in one store.
    pub(crate) fn root_swing(&self, new_root: *mut NodeHeader) {
        debug_assert!(is_marked(self.root.load(READ_ORD)));
        self.root.store(new_root, WRITE_ORD);
    }

    /// One-shot unlocked root replacement. Fails against a locked or
    /// changed root.
    #[must_use]
    pub(crate) fn root_cas(&self, old: *mut NodeHeader, new: *mut NodeHeader) -> bool {
        self.root
            .compare_exchange(old, new, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
    }

    // ------------------------------------------------------------------------
    //  Diagnostics
    // ------------------------------------------------------------------------

    /// Number of leaves reachable through the list. Quiescent use only.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        let mut count = 0;
        let mut cur = self.head.next_ptr();
        while cur != self.tail_ptr() {
            count += 1;
            // SAFETY: quiescent walk; the list is stable.
            cur = unsafe { (*cur).next_ptr() };
        }
        count
    }

    /// All ranges in list order as `(offset, length, payload)`. Quiescent
    /// use only.
    #[must_use]
    pub fn ranges(&self) -> Vec<(u64, u64, P)> {
        let mut out = Vec::new();
        let mut cur = self.head.next_ptr();
        while cur != self.tail_ptr() {
            // SAFETY: quiescent walk; the list is stable.
            let leaf = unsafe { &*cur };
            out.push((leaf.offset(), leaf.length(), leaf.payload()));
            cur = leaf.next_ptr();
        }
        out
    }

    /// Number of leaves reachable through the tree. Quiescent use only.
    ///
    /// Always equals [`Self::leaf_count`]; the pair exists to catch a
    /// structure that drifted from the list in tests.
    #[must_use]
    pub fn tree_leaf_count(&self) -> usize {
        fn count(node: *mut NodeHeader) -> usize {
            let node_ref = NodeRef::from_raw(node);
            if node_ref.is_leaf() {
                return 1;
            }
            node_ref.children().into_iter().map(count).sum()
        }
        let root = self.root_node();
        if root.is_null() {
            0
        } else {
            count(root)
        }
    }
}

impl<P: Payload> Default for RangeArt<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Payload> Drop for RangeArt<P> {
    fn drop(&mut self) {
        let root = unmark_ptr(*self.root.get_mut());
        if !root.is_null() {
            // SAFETY: &mut self means no guard is live; the subtree is ours.
            unsafe { reclaim::teardown::<P>(root) };
        }
    }
}

impl<P: Payload + fmt::Debug> fmt::Debug for RangeArt<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeArt")
            .field("empty", &self.is_empty())
            .finish_non_exhaustive()
    }
}
