//! Filepath: src/node/indexed.rs
//!
//! 48-slot indexed node: a 256-entry byte index mapping each edge to a
//! packed slot, plus a presence bitmap for neighbor scans.
//!
//! Delete relocates the highest packed slot into the vacated one so the
//! slot array stays dense; the byte index entry of the moved edge is
//! rewritten to follow it.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8};

use crate::bitmap::{ascending_from, descending_from, Bitmap256};
use crate::node::{is_fault, NodeHeader, NodeKind, NodeRef, RangeHit};
use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};

/// Byte index value for an unmapped edge.
pub const NO_SLOT: u8 = 0xFF;

/// Slot capacity.
const CAP: usize = 48;

/// Interior node holding up to 48 children behind a full byte index.
#[derive(Debug)]
#[repr(C)]
pub struct Node48 {
    pub(crate) header: NodeHeader,
    slot_of: [AtomicU8; 256],
    slots: [AtomicPtr<NodeHeader>; CAP],
    presence: Bitmap256,
}

impl Node48 {
    /// Allocate an empty node owning `offset` at `level`.
    #[must_use]
    pub fn boxed(level: u8, offset: u64) -> Box<Self> {
        Box::new(Self {
            header: NodeHeader::new(NodeKind::N48, level, offset),
            slot_of: [const { AtomicU8::new(NO_SLOT) }; 256],
            slots: [const { AtomicPtr::new(ptr::null_mut()) }; CAP],
            presence: Bitmap256::new(),
        })
    }

    /// Probe the exact edge `key`.
    #[must_use]
    pub(crate) fn child(&self, key: u8, parent_level: u8) -> Option<NodeRef> {
        loop {
            let idx = self.slot_of[usize::from(key)].load(READ_ORD);
            if idx == NO_SLOT {
                return None;
            }
            let child = self.slots[usize::from(idx)].load(READ_ORD);
            if child.is_null() {
                return None;
            }
            let child = NodeRef::from_raw(child);
            if is_fault(child, key, parent_level) {
                continue;
            }
            return Some(child);
        }
    }

    /// Child on edge `key`, or the nearest occupied neighbor found through
    /// the presence bitmap.
    #[must_use]
    pub(crate) fn child_range(&self, key: u8, parent_level: u8) -> Option<(RangeHit, NodeRef)> {
        'retry: loop {
            let idx = self.slot_of[usize::from(key)].load(READ_ORD);
            if idx != NO_SLOT {
                let child = self.slots[usize::from(idx)].load(READ_ORD);
                if !child.is_null() {
                    let child = NodeRef::from_raw(child);
                    if is_fault(child, key, parent_level) {
                        continue 'retry;
                    }
                    return Some((RangeHit::Match, child));
                }
            }

            let snap = self.presence.snapshot();
            for k in descending_from(snap, key) {
                let idx = self.slot_of[usize::from(k)].load(READ_ORD);
                if idx == NO_SLOT {
                    continue;
                }
                let child = self.slots[usize::from(idx)].load(READ_ORD);
                if child.is_null() {
                    continue;
                }
                let child = NodeRef::from_raw(child);
                if is_fault(child, k, parent_level) {
                    continue 'retry;
                }
                return Some((RangeHit::Prev, child));
            }
            for k in ascending_from(snap, key) {
                let idx = self.slot_of[usize::from(k)].load(READ_ORD);
                if idx == NO_SLOT {
                    continue;
                }
                let child = self.slots[usize::from(idx)].load(READ_ORD);
                if child.is_null() {
                    continue;
                }
                let child = NodeRef::from_raw(child);
                if is_fault(child, k, parent_level) {
                    continue 'retry;
                }
                return Some((RangeHit::Next, child));
            }
            return None;
        }
    }

    /// Add a child on edge `key`. Caller holds the node lock.
    pub(crate) fn insert(&self, key: u8, child: NodeRef) -> bool {
        let existing = self.slot_of[usize::from(key)].load(RELAXED);
        if existing != NO_SLOT {
            // Edge mapped but slot vacated; refill in place.
            debug_assert!(self.slots[usize::from(existing)].load(RELAXED).is_null());
            self.slots[usize::from(existing)].store(child.as_ptr(), WRITE_ORD);
            return true;
        }
        let idx = self.header.count();
        if idx == CAP {
            return false;
        }
        self.slots[idx].store(child.as_ptr(), WRITE_ORD);
        self.slot_of[usize::from(key)].store(idx as u8, WRITE_ORD);
        self.presence.set(key);
        self.header.set_count(idx + 1);
        true
    }

    /// Add a child to an unpublished node.
    pub(crate) fn insert_force(&self, key: u8, child: NodeRef) {
        let idx = self.header.count();
        debug_assert!(idx < CAP);
        self.slot_of[usize::from(key)].store(idx as u8, RELAXED);
        self.slots[idx].store(child.as_ptr(), RELAXED);
        self.presence.set(key);
        self.header.set_count(idx + 1);
    }

    /// Remove the child on edge `key`. Caller holds the node lock.
    pub(crate) fn delete(&self, key: u8) {
        let idx = usize::from(self.slot_of[usize::from(key)].load(RELAXED));
        let last = self.header.count() - 1;
        debug_assert_ne!(idx, usize::from(NO_SLOT));

        self.presence.clear(key);
        if idx == last {
            self.slots[idx].store(ptr::null_mut(), WRITE_ORD);
            self.slot_of[usize::from(key)].store(NO_SLOT, WRITE_ORD);
            self.header.set_count(last);
            return;
        }

        // Find the edge mapped to the last packed slot, then relocate it.
        let mut last_key: usize = 0;
        while last_key < 256 {
            if self.slot_of[last_key].load(RELAXED) == last as u8 {
                break;
            }
            last_key += 1;
        }
        debug_assert!(last_key < 256);

        self.slots[idx].store(ptr::null_mut(), WRITE_ORD);
        self.slot_of[usize::from(key)].store(NO_SLOT, WRITE_ORD);
        self.slots[idx].store(self.slots[last].load(RELAXED), WRITE_ORD);
        self.slot_of[last_key].store(idx as u8, WRITE_ORD);
        self.header.set_count(last);
    }

    /// Re-point the occupied edge `key`. Caller holds the node lock.
    pub(crate) fn update(&self, key: u8, new_child: NodeRef) {
        let idx = self.slot_of[usize::from(key)].load(RELAXED);
        debug_assert_ne!(idx, NO_SLOT);
        debug_assert!(!self.slots[usize::from(idx)].load(RELAXED).is_null());
        self.slots[usize::from(idx)].store(new_child.as_ptr(), WRITE_ORD);
    }

    /// With exactly two children, the one not on edge `key`. Caller holds
    /// the node lock.
    #[must_use]
    pub(crate) fn remaining(&self, key: u8) -> NodeRef {
        for k in ascending_from(self.presence.snapshot(), 0) {
            if k != key {
                let idx = self.slot_of[usize::from(k)].load(RELAXED);
                debug_assert_ne!(idx, NO_SLOT);
                return NodeRef::from_raw(self.slots[usize::from(idx)].load(RELAXED));
            }
        }
        unreachable!("no sibling beside edge {key}");
    }

    /// Occupied `(edge, child)` pairs. Caller holds the node lock or the
    /// node is quiescent.
    #[must_use]
    pub(crate) fn occupied(&self) -> Vec<(u8, *mut NodeHeader)> {
        ascending_from(self.presence.snapshot(), 0)
            .filter_map(|k| {
                let idx = self.slot_of[usize::from(k)].load(RELAXED);
                if idx == NO_SLOT {
                    return None;
                }
                let child = self.slots[usize::from(idx)].load(RELAXED);
                (!child.is_null()).then_some((k, child))
            })
            .collect()
    }

    /// Live children for quiescent walks.
    #[must_use]
    pub(crate) fn children(&self) -> Vec<*mut NodeHeader> {
        self.occupied().into_iter().map(|(_, c)| c).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::LEAF_LEVEL;

    fn edge_leaf(key: u8) -> *mut NodeHeader {
        Box::into_raw(Box::new(NodeHeader::new(
            NodeKind::Leaf,
            LEAF_LEVEL,
            u64::from(key),
        )))
    }

    fn free(ptr: *mut NodeHeader) {
        // SAFETY: test-local allocation from `edge_leaf`.
        unsafe { drop(Box::from_raw(ptr)) };
    }

    #[test]
    fn test_insert_probe_full() {
        let node = Node48::boxed(4, 0);
        let leaves: Vec<_> = (0..48_u8).map(|k| edge_leaf(k * 5)).collect();
        for (i, &leaf) in leaves.iter().enumerate() {
            assert!(node.insert(i as u8 * 5, NodeRef::from_raw(leaf)));
        }
        let overflow = edge_leaf(253);
        assert!(!node.insert(253, NodeRef::from_raw(overflow)));
        assert_eq!(node.header.count(), 48);

        for (i, &leaf) in leaves.iter().enumerate() {
            assert_eq!(node.child(i as u8 * 5, 4).map(NodeRef::as_ptr), Some(leaf));
        }
        assert!(node.child(7, 4).is_none());

        for leaf in leaves {
            free(leaf);
        }
        free(overflow);
    }

    #[test]
    fn test_child_range_scans() {
        let node = Node48::boxed(4, 0);
        let lo = edge_leaf(20);
        let hi = edge_leaf(90);
        node.insert(20, NodeRef::from_raw(lo));
        node.insert(90, NodeRef::from_raw(hi));

        let (hit, child) = node.child_range(90, 4).unwrap();
        assert_eq!((hit, child.as_ptr()), (RangeHit::Match, hi));

        let (hit, child) = node.child_range(50, 4).unwrap();
        assert_eq!((hit, child.as_ptr()), (RangeHit::Prev, lo));

        let (hit, child) = node.child_range(3, 4).unwrap();
        assert_eq!((hit, child.as_ptr()), (RangeHit::Next, lo));

        free(lo);
        free(hi);
    }

    #[test]
    fn test_delete_relocates_last_slot() {
        let node = Node48::boxed(4, 0);
        let leaves: Vec<_> = (0..10_u8).map(edge_leaf).collect();
        for (i, &leaf) in leaves.iter().enumerate() {
            node.insert(i as u8, NodeRef::from_raw(leaf));
        }

        // Deleting edge 0 moves the pair packed last (edge 9) into slot 0.
        node.delete(0);
        assert_eq!(node.header.count(), 9);
        assert!(node.child(0, 4).is_none());
        for k in 1..10_u8 {
            assert_eq!(node.child(k, 4).map(NodeRef::as_ptr), Some(leaves[usize::from(k)]));
        }

        // Deleting the edge in the last packed slot takes the short path.
        node.delete(9);
        assert_eq!(node.header.count(), 8);
        assert!(node.child(9, 4).is_none());

        for leaf in leaves {
            free(leaf);
        }
    }

    #[test]
    fn test_expand_n16_to_n48() {
        let node = super::super::linear::Node16::boxed(2, 0x0107);
        let keys: Vec<u8> = (0..16).map(|i| i * 16 + 3).collect();
        let children: Vec<_> = keys
            .iter()
            .map(|&k| {
                // Interior children at level 3 under a level-2 parent.
                Box::into_raw(Box::new(NodeHeader::new(
                    NodeKind::N4,
                    3,
                    0x0107_u64 << 8 | u64::from(k),
                )))
            })
            .collect();
        for (&k, &c) in keys.iter().zip(children.iter()) {
            node.insert(k, NodeRef::from_raw(c));
        }

        let old_ref = NodeRef::from_raw(Box::into_raw(node).cast());
        let new_ref = old_ref.expand();
        assert_eq!(new_ref.kind(), NodeKind::N48);
        assert_eq!(new_ref.count(), 16);
        for (&k, &c) in keys.iter().zip(children.iter()) {
            assert_eq!(new_ref.child(k).map(NodeRef::as_ptr), Some(c));
        }

        // SAFETY: all test-local allocations.
        unsafe {
            drop(Box::from_raw(old_ref.as_ptr().cast::<super::super::linear::Node16>()));
            drop(Box::from_raw(new_ref.as_ptr().cast::<Node48>()));
        }
        for c in children {
            free(c);
        }
    }
}
