//! Filepath: src/node.rs
//!
//! Adaptive node encodings and the type-erased node reference.
//!
//! Every tree node, leaf or interior, begins with a [`NodeHeader`]
//! (`repr(C)` first field), so a `*mut NodeHeader` can address any of them
//! and the kind byte selects the concrete layout:
//!
//! | Kind | Layout | Capacity |
//! |------|--------|----------|
//! | `N4` | unsorted key/slot pairs | 4 |
//! | `N16` | unsorted key/slot pairs, SIMD probe | 16 |
//! | `N48` | 256-entry slot index + packed slots | 48 |
//! | `N256` | direct slot array | 256 |
//!
//! [`NodeRef`] wraps the erased pointer and dispatches the child-table
//! contract over the kinds. Read-side methods are designed for optimistic
//! callers: they tolerate torn states and re-check that a fetched child
//! still belongs to the probed edge byte (a slot can be re-pointed at a
//! different subtree between the key probe and the child load).

pub mod direct;
pub mod indexed;
pub mod linear;

use std::sync::atomic::AtomicU16;

use crate::key::prefix_byte;
use crate::ordering::{READ_ORD, WRITE_ORD};
use crate::version::VersionLock;

use direct::Node256;
use indexed::Node48;
use linear::{Node16, Node4};

// ============================================================================
//  Header
// ============================================================================

/// Discriminant stored in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    /// Range leaf.
    Leaf = 0,
    /// 4-slot interior node.
    N4 = 1,
    /// 16-slot interior node.
    N16 = 2,
    /// 48-slot interior node.
    N48 = 3,
    /// 256-slot interior node.
    N256 = 4,
}

/// Common prefix of every node allocation.
///
/// `level` and `offset` are written before the node is published and never
/// change afterwards; `count` moves only under the version lock.
#[derive(Debug)]
#[repr(C)]
pub struct NodeHeader {
    kind: NodeKind,
    level: u8,
    count: AtomicU16,
    offset: u64,
    pub(crate) version: VersionLock,
}

impl NodeHeader {
    pub(crate) const fn new(kind: NodeKind, level: u8, offset: u64) -> Self {
        Self {
            kind,
            level,
            count: AtomicU16::new(0),
            offset,
            version: VersionLock::new(),
        }
    }

    /// Node kind.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Tree level ([`crate::key::LEAF_LEVEL`] for leaves).
    #[inline]
    #[must_use]
    pub const fn level(&self) -> u8 {
        self.level
    }

    /// Owned key prefix (full index for leaves).
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Occupied slot count.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        usize::from(self.count.load(READ_ORD))
    }

    #[inline]
    pub(crate) fn set_count(&self, count: usize) {
        self.count.store(count as u16, WRITE_ORD);
    }
}

/// Whether `child`, fetched through edge byte `key` of a parent at
/// `parent_level`, still belongs on that edge.
///
/// False means the slot was recycled mid-read; the caller retries the probe.
#[inline]
#[must_use]
pub(crate) fn is_fault(child: NodeRef, key: u8, parent_level: u8) -> bool {
    key != prefix_byte(child.offset(), child.level(), parent_level)
}

// ============================================================================
//  NodeRef
// ============================================================================

/// Nearest-neighbor outcome of [`NodeRef::child_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeHit {
    /// Exact edge byte found.
    Match,
    /// Closest occupied edge below the probe.
    Prev,
    /// Closest occupied edge above the probe.
    Next,
}

/// Type-erased reference to a live node.
///
/// Holders must keep a collector guard active for as long as the reference
/// is dereferenced; retired nodes stay readable until every guard that
/// could have seen them is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRef {
    ptr: *mut NodeHeader,
}

impl NodeRef {
    #[inline]
    pub(crate) const fn from_raw(ptr: *mut NodeHeader) -> Self {
        Self { ptr }
    }

    #[inline]
    pub(crate) const fn as_ptr(self) -> *mut NodeHeader {
        self.ptr
    }

    #[inline]
    fn header(&self) -> &NodeHeader {
        // SAFETY: NodeRef values are only formed from published nodes while
        // the caller holds a collector guard, so the allocation is live.
        unsafe { &*self.ptr }
    }

    /// Node kind.
    #[inline]
    #[must_use]
    pub fn kind(self) -> NodeKind {
        self.header().kind()
    }

    /// Whether this is a leaf.
    #[inline]
    #[must_use]
    pub fn is_leaf(self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    /// Tree level.
    #[inline]
    #[must_use]
    pub fn level(self) -> u8 {
        self.header().level()
    }

    /// Owned key prefix.
    #[inline]
    #[must_use]
    pub fn offset(self) -> u64 {
        self.header().offset()
    }

    /// Occupied slot count.
    #[inline]
    #[must_use]
    pub fn count(self) -> usize {
        self.header().count()
    }

    /// The embedded version lock.
    #[inline]
    pub(crate) fn version(&self) -> &VersionLock {
        &self.header().version
    }

    #[inline]
    fn as_n4(&self) -> &Node4 {
        debug_assert_eq!(self.kind(), NodeKind::N4);
        // SAFETY: kind byte says N4 and kind never changes after allocation.
        unsafe { &*self.ptr.cast() }
    }

    #[inline]
    fn as_n16(&self) -> &Node16 {
        debug_assert_eq!(self.kind(), NodeKind::N16);
        // SAFETY: kind byte says N16.
        unsafe { &*self.ptr.cast() }
    }

    #[inline]
    fn as_n48(&self) -> &Node48 {
        debug_assert_eq!(self.kind(), NodeKind::N48);
        // SAFETY: kind byte says N48.
        unsafe { &*self.ptr.cast() }
    }

    #[inline]
    fn as_n256(&self) -> &Node256 {
        debug_assert_eq!(self.kind(), NodeKind::N256);
        // SAFETY: kind byte says N256.
        unsafe { &*self.ptr.cast() }
    }

    /// Child on the exact edge `key`, if present.
    ///
    /// Optimistic read; retries internally when a recycled slot is detected.
    #[must_use]
    pub(crate) fn child(self, key: u8) -> Option<NodeRef> {
        let level = self.level();
        match self.kind() {
            NodeKind::N4 => self.as_n4().child_scalar(key, level),
            NodeKind::N16 => self.as_n16().child_simd(key, level),
            NodeKind::N48 => self.as_n48().child(key, level),
            NodeKind::N256 => self.as_n256().child(key),
            NodeKind::Leaf => unreachable!("child probe on a leaf"),
        }
    }

    /// Child on edge `key`, or the nearest occupied neighbor.
    ///
    /// `None` means the node was caught in a torn state with no visible
    /// child at all; the caller restarts its traversal.
    #[must_use]
    pub(crate) fn child_range(self, key: u8) -> Option<(RangeHit, NodeRef)> {
        let level = self.level();
        match self.kind() {
            NodeKind::N4 => self.as_n4().child_range(key, level),
            NodeKind::N16 => self.as_n16().child_range(key, level),
            NodeKind::N48 => self.as_n48().child_range(key, level),
            NodeKind::N256 => self.as_n256().child_range(key),
            NodeKind::Leaf => unreachable!("range probe on a leaf"),
        }
    }

    /// Add a child on edge `key`. Caller holds this node's lock.
    ///
    /// Returns `false` when the node is full and must be expanded.
    pub(crate) fn insert_child(self, key: u8, child: NodeRef) -> bool {
        match self.kind() {
            NodeKind::N4 => self.as_n4().insert(key, child),
            NodeKind::N16 => self.as_n16().insert(key, child),
            NodeKind::N48 => self.as_n48().insert(key, child),
            NodeKind::N256 => self.as_n256().insert(key, child),
            NodeKind::Leaf => unreachable!("child insert on a leaf"),
        }
    }

    /// Add a child to an unpublished node. Must not fail.
    pub(crate) fn insert_child_force(self, key: u8, child: NodeRef) {
        match self.kind() {
            NodeKind::N4 => self.as_n4().insert_force(key, child),
            NodeKind::N16 => self.as_n16().insert_force(key, child),
            NodeKind::N48 => self.as_n48().insert_force(key, child),
            NodeKind::N256 => self.as_n256().insert_force(key, child),
            NodeKind::Leaf => unreachable!("child insert on a leaf"),
        }
    }

    /// Remove the child on edge `key`. Caller holds this node's lock.
    pub(crate) fn delete_child(self, key: u8) {
        match self.kind() {
            NodeKind::N4 => self.as_n4().delete_scalar(key),
            NodeKind::N16 => self.as_n16().delete_simd(key),
            NodeKind::N48 => self.as_n48().delete(key),
            NodeKind::N256 => self.as_n256().delete(key),
            NodeKind::Leaf => unreachable!("child delete on a leaf"),
        }
    }

    /// Re-point the occupied edge `key` at `new_child`. Caller holds this
    /// node's lock.
    pub(crate) fn update_child(self, key: u8, new_child: NodeRef) {
        match self.kind() {
            NodeKind::N4 => self.as_n4().update_scalar(key, new_child),
            NodeKind::N16 => self.as_n16().update_simd(key, new_child),
            NodeKind::N48 => self.as_n48().update(key, new_child),
            NodeKind::N256 => self.as_n256().update(key, new_child),
            NodeKind::Leaf => unreachable!("child update on a leaf"),
        }
    }

    /// With exactly two children, the one not on edge `key`. Caller holds
    /// this node's lock.
    #[must_use]
    pub(crate) fn remaining_child(self, key: u8) -> NodeRef {
        debug_assert_eq!(self.count(), 2);
        match self.kind() {
            NodeKind::N4 => self.as_n4().remaining(key),
            NodeKind::N16 => self.as_n16().remaining(key),
            NodeKind::N48 => self.as_n48().remaining(key),
            NodeKind::N256 => self.as_n256().remaining(key),
            NodeKind::Leaf => unreachable!("sibling probe on a leaf"),
        }
    }

    /// Whether the next insert on a fresh edge would not fit.
    #[must_use]
    pub(crate) fn need_expand(self) -> bool {
        match self.kind() {
            NodeKind::N4 => self.count() == 4,
            NodeKind::N16 => self.count() == 16,
            NodeKind::N48 => self.count() == 48,
            NodeKind::N256 | NodeKind::Leaf => false,
        }
    }

    /// Copy this full node into a fresh node of the next larger kind.
    ///
    /// Caller holds this node's lock, publishes the returned node in the
    /// parent, and retires this one.
    #[must_use]
    pub(crate) fn expand(self) -> NodeRef {
        let level = self.level();
        let offset = self.offset();
        match self.kind() {
            NodeKind::N4 => {
                let old = self.as_n4();
                let new = Node16::boxed(level, offset);
                let new_ref = NodeRef::from_raw(Box::into_raw(new).cast());
                for idx in 0..4 {
                    new_ref.insert_child_force(old.key_at(idx), NodeRef::from_raw(old.child_at(idx)));
                }
                new_ref
            }
            NodeKind::N16 => {
                let old = self.as_n16();
                let new = Node48::boxed(level, offset);
                let new_ref = NodeRef::from_raw(Box::into_raw(new).cast());
                for idx in 0..16 {
                    new_ref.insert_child_force(old.key_at(idx), NodeRef::from_raw(old.child_at(idx)));
                }
                new_ref
            }
            NodeKind::N48 => {
                let old = self.as_n48();
                let new = Node256::boxed(level, offset);
                let new_ref = NodeRef::from_raw(Box::into_raw(new).cast());
                for (key, child) in old.occupied() {
                    new_ref.insert_child_force(key, NodeRef::from_raw(child));
                }
                new_ref
            }
            NodeKind::N256 | NodeKind::Leaf => unreachable!("expand on {:?}", self.kind()),
        }
    }

    /// All live children, for quiescent walks (teardown, diagnostics).
    #[must_use]
    pub(crate) fn children(self) -> Vec<*mut NodeHeader> {
        match self.kind() {
            NodeKind::N4 => self.as_n4().children(),
            NodeKind::N16 => self.as_n16().children(),
            NodeKind::N48 => self.as_n48().children(),
            NodeKind::N256 => self.as_n256().children(),
            NodeKind::Leaf => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{prefix_of, LEAF_LEVEL};

    /// Fabricate a header that stands in for a leaf with the given index.
    fn leaf_header(index: u64) -> Box<NodeHeader> {
        Box::new(NodeHeader::new(NodeKind::Leaf, LEAF_LEVEL, index))
    }

    #[test]
    fn test_fault_detection() {
        let child = leaf_header(0x01_02_03_04_05);
        let child_ref = NodeRef::from_raw(Box::into_raw(child));

        // Fetched through the right edge at level 2.
        assert!(!is_fault(child_ref, 0x03, 2));
        // Fetched through an edge it no longer matches.
        assert!(is_fault(child_ref, 0x42, 2));

        // SAFETY: allocated above, not shared.
        unsafe { drop(Box::from_raw(child_ref.as_ptr())) };
    }

    #[test]
    fn test_interior_prefix_fault() {
        let node = Box::new(NodeHeader::new(NodeKind::N4, 3, prefix_of(0x01_02_03_00_00, 3)));
        let node_ref = NodeRef::from_raw(Box::into_raw(node));

        assert!(!is_fault(node_ref, 0x03, 2));
        assert!(is_fault(node_ref, 0x04, 2));

        // SAFETY: allocated above, not shared.
        unsafe { drop(Box::from_raw(node_ref.as_ptr())) };
    }

    #[test]
    fn test_header_count_roundtrip() {
        let header = NodeHeader::new(NodeKind::N256, 0, 0);
        assert_eq!(header.count(), 0);
        header.set_count(256);
        assert_eq!(header.count(), 256);
    }
}
