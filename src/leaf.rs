//! Filepath: src/leaf.rs
//!
//! Range leaves and the sorted doubly-linked leaf list.
//!
//! A leaf records one byte range `[offset, offset + length)` with an opaque
//! payload and a transaction tag. Leaves are chained in ascending offset
//! order between two permanent sentinels whose offset is
//! [`KEY_LIMIT`](crate::key::KEY_LIMIT); the sentinels never appear in the
//! tree and never reach callers.
//!
//! Each leaf carries a raw mutex. Writers lock runs of consecutive leaves
//! in ascending order (see `tree::insert`), and the lock is deliberately a
//! raw one: it is acquired when a leaf is allocated or a run is built and
//! released by whichever code path finishes the operation, which rules out
//! scoped guards.
//!
//! `offset`, `payload`, and `tx_id` are immutable for the life of a leaf;
//! `length` shrinks in place when a later insert trims the range's tail.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64};

use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

use crate::key::{KEY_LIMIT, LEAF_LEVEL};
use crate::node::{NodeHeader, NodeKind, NodeRef};
use crate::ordering::{READ_ORD, WRITE_ORD};

/// Value attached to a range.
///
/// When an insert punches a hole in an existing range, the surviving tail
/// is re-inserted with its payload advanced by the number of bytes cut off
/// the front; [`Payload::offset_by`] supplies that adjustment. For payloads
/// with no positional meaning it can simply return `self`.
pub trait Payload: Copy + Default + Send + Sync + 'static {
    /// The payload for the same range with `delta` bytes trimmed off the
    /// front.
    #[must_use]
    fn offset_by(self, delta: u64) -> Self;
}

impl Payload for u64 {
    fn offset_by(self, delta: u64) -> Self {
        self.wrapping_add(delta)
    }
}

impl Payload for usize {
    fn offset_by(self, delta: u64) -> Self {
        self.wrapping_add(delta as usize)
    }
}

impl Payload for () {
    fn offset_by(self, _delta: u64) -> Self {}
}

/// A leaf holding one indexed byte range.
#[repr(C)]
pub struct RangeLeaf<P> {
    pub(crate) header: NodeHeader,
    length: AtomicU64,
    tx_id: i32,
    payload: P,
    prev: AtomicPtr<RangeLeaf<P>>,
    next: AtomicPtr<RangeLeaf<P>>,
    lock: RawMutex,
}

impl<P: Payload> RangeLeaf<P> {
    /// Allocate an unlinked leaf. The mutex starts released; insert locks
    /// it before the leaf becomes reachable.
    #[must_use]
    pub(crate) fn boxed(index: u64, length: u64, payload: P, tx_id: i32) -> Box<Self> {
        Box::new(Self {
            header: NodeHeader::new(NodeKind::Leaf, LEAF_LEVEL, index),
            length: AtomicU64::new(length),
            tx_id,
            payload,
            prev: AtomicPtr::new(ptr::null_mut()),
            next: AtomicPtr::new(ptr::null_mut()),
            lock: RawMutex::INIT,
        })
    }

    /// Allocate a list sentinel: offset one past the keyspace, zero length.
    #[must_use]
    pub(crate) fn sentinel() -> Box<Self> {
        Self::boxed(KEY_LIMIT, 0, P::default(), 0)
    }

    /// Range start.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.header.offset()
    }

    /// Range length in bytes.
    #[inline]
    #[must_use]
    pub fn length(&self) -> u64 {
        self.length.load(READ_ORD)
    }

    /// One past the last byte of the range.
    #[inline]
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset().saturating_add(self.length())
    }

    /// Shrink the range in place. Caller holds this leaf's mutex.
    #[inline]
    pub(crate) fn set_length(&self, length: u64) {
        self.length.store(length, WRITE_ORD);
    }

    /// Attached payload.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> P {
        self.payload
    }

    /// Transaction tag.
    #[inline]
    #[must_use]
    pub fn tx_id(&self) -> i32 {
        self.tx_id
    }

    /// Whether this is one of the two list sentinels.
    #[inline]
    #[must_use]
    pub(crate) fn is_sentinel(&self) -> bool {
        self.offset() == KEY_LIMIT
    }

    #[inline]
    pub(crate) fn prev_ptr(&self) -> *mut Self {
        self.prev.load(READ_ORD)
    }

    #[inline]
    pub(crate) fn next_ptr(&self) -> *mut Self {
        self.next.load(READ_ORD)
    }

    #[inline]
    pub(crate) fn set_prev(&self, leaf: *mut Self) {
        self.prev.store(leaf, WRITE_ORD);
    }

    #[inline]
    pub(crate) fn set_next(&self, leaf: *mut Self) {
        self.next.store(leaf, WRITE_ORD);
    }

    /// Block until this leaf's mutex is held.
    #[inline]
    pub(crate) fn lock(&self) {
        self.lock.lock();
    }

    /// Release this leaf's mutex.
    ///
    /// # Safety
    /// The mutex must be held by the current protocol step (locked by this
    /// thread's run acquisition or by leaf allocation).
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        // SAFETY: forwarded contract.
        unsafe { self.lock.unlock() };
    }

    /// View this leaf as a type-erased tree node.
    #[inline]
    pub(crate) fn node_ref(&self) -> NodeRef {
        NodeRef::from_raw(ptr::from_ref(&self.header).cast_mut())
    }
}

/// Reinterpret a type-erased node known to be a leaf.
///
/// # Safety
/// `node` must point at a live `RangeLeaf<P>` with the right payload type
/// (kind byte `Leaf` under this tree's `P`).
#[inline]
pub(crate) unsafe fn leaf_from_node<P: Payload>(node: *mut NodeHeader) -> *mut RangeLeaf<P> {
    debug_assert_eq!(
        // SAFETY: caller guarantees `node` is live.
        unsafe { (*node).kind() },
        NodeKind::Leaf
    );
    node.cast()
}
