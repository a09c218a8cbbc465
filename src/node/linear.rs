//! Filepath: src/node/linear.rs
//!
//! Linear node encodings: unsorted key/slot pair arrays for 4 and 16 slots.
//!
//! Keys are appended in arrival order; delete swaps the last pair into the
//! vacated position. Readers iterate from the highest occupied index down so
//! a concurrent swap is seen at most once, and publication follows
//! key-then-slot-then-count store order so a visible count implies visible
//! pairs.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU8};

use crate::node::{is_fault, NodeHeader, NodeKind, NodeRef, RangeHit};
use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};
use crate::scan::eq_mask16;

/// Interior node holding up to `CAP` unsorted key/slot pairs.
#[derive(Debug)]
#[repr(C)]
pub struct LinearNode<const CAP: usize> {
    pub(crate) header: NodeHeader,
    keys: [AtomicU8; CAP],
    slots: [AtomicPtr<NodeHeader>; CAP],
}

/// 4-slot interior node.
pub type Node4 = LinearNode<4>;

/// 16-slot interior node.
pub type Node16 = LinearNode<16>;

impl<const CAP: usize> LinearNode<CAP> {
    const KIND: NodeKind = match CAP {
        4 => NodeKind::N4,
        16 => NodeKind::N16,
        _ => panic!("unsupported linear node capacity"),
    };

    /// Allocate an empty node owning `offset` at `level`.
    #[must_use]
    pub fn boxed(level: u8, offset: u64) -> Box<Self> {
        Box::new(Self {
            header: NodeHeader::new(Self::KIND, level, offset),
            keys: [const { AtomicU8::new(0) }; CAP],
            slots: [const { AtomicPtr::new(ptr::null_mut()) }; CAP],
        })
    }

    /// Scalar probe for the exact edge `key`.
    #[must_use]
    pub(crate) fn child_scalar(&self, key: u8, parent_level: u8) -> Option<NodeRef> {
        'retry: loop {
            let count = self.header.count();
            for idx in (0..count).rev() {
                if self.keys[idx].load(READ_ORD) == key {
                    let child = self.slots[idx].load(READ_ORD);
                    if !child.is_null() {
                        let child = NodeRef::from_raw(child);
                        if is_fault(child, key, parent_level) {
                            continue 'retry;
                        }
                        return Some(child);
                    }
                }
            }
            return None;
        }
    }

    /// Child on edge `key`, or the nearest occupied neighbor.
    #[must_use]
    pub(crate) fn child_range(&self, key: u8, parent_level: u8) -> Option<(RangeHit, NodeRef)> {
        'retry: loop {
            let count = self.header.count();
            let mut best_diff: i32 = i32::MAX;
            let mut best: Option<(*mut NodeHeader, u8)> = None;

            for idx in (0..count).rev() {
                let i_key = self.keys[idx].load(READ_ORD);
                let diff = i32::from(i_key) - i32::from(key);
                if diff == 0 {
                    let child = self.slots[idx].load(READ_ORD);
                    if !child.is_null() {
                        let child = NodeRef::from_raw(child);
                        if is_fault(child, key, parent_level) {
                            continue 'retry;
                        }
                        return Some((RangeHit::Match, child));
                    }
                } else if diff < 0 {
                    // A smaller key beats any larger key and any smaller key
                    // farther away.
                    if best_diff > 0 || best_diff < diff {
                        let child = self.slots[idx].load(READ_ORD);
                        if !child.is_null() {
                            best_diff = diff;
                            best = Some((child, i_key));
                        }
                    }
                } else if best_diff > 0 && best_diff > diff {
                    let child = self.slots[idx].load(READ_ORD);
                    if !child.is_null() {
                        best_diff = diff;
                        best = Some((child, i_key));
                    }
                }
            }

            let (ptr, best_key) = best?;
            let child = NodeRef::from_raw(ptr);
            if is_fault(child, best_key, parent_level) {
                continue 'retry;
            }
            let hit = if best_key < key { RangeHit::Prev } else { RangeHit::Next };
            return Some((hit, child));
        }
    }

    /// Append a pair. Caller holds the node lock.
    pub(crate) fn insert(&self, key: u8, child: NodeRef) -> bool {
        let idx = self.header.count();
        if idx == CAP {
            return false;
        }
        self.keys[idx].store(key, WRITE_ORD);
        self.slots[idx].store(child.as_ptr(), WRITE_ORD);
        self.header.set_count(idx + 1);
        true
    }

    /// Append a pair to an unpublished node.
    pub(crate) fn insert_force(&self, key: u8, child: NodeRef) {
        let idx = self.header.count();
        debug_assert!(idx < CAP);
        self.keys[idx].store(key, RELAXED);
        self.slots[idx].store(child.as_ptr(), RELAXED);
        self.header.set_count(idx + 1);
    }

    /// Remove the pair for `key` by swapping the last pair into its place.
    /// Caller holds the node lock.
    pub(crate) fn delete_scalar(&self, key: u8) {
        let last = self.header.count() - 1;
        if self.keys[last].load(RELAXED) == key {
            self.header.set_count(last);
            self.slots[last].store(ptr::null_mut(), WRITE_ORD);
            return;
        }
        let mut idx = 0;
        while idx < last {
            if self.keys[idx].load(RELAXED) == key {
                break;
            }
            idx += 1;
        }
        debug_assert!(idx < last);
        self.relocate_last(idx, last);
    }

    /// Shared tail of delete: hide the victim slot, move the last pair in,
    /// shrink, then clear the vacated tail slot.
    fn relocate_last(&self, idx: usize, last: usize) {
        self.slots[idx].store(ptr::null_mut(), WRITE_ORD);
        self.keys[idx].store(self.keys[last].load(RELAXED), WRITE_ORD);
        self.slots[idx].store(self.slots[last].load(RELAXED), WRITE_ORD);
        self.header.set_count(last);
        self.slots[last].store(ptr::null_mut(), WRITE_ORD);
    }

    /// Scalar in-place re-point of the occupied edge `key`.
    pub(crate) fn update_scalar(&self, key: u8, new_child: NodeRef) {
        let count = self.header.count();
        for idx in 0..count {
            if self.keys[idx].load(RELAXED) == key {
                debug_assert!(!self.slots[idx].load(RELAXED).is_null());
                self.slots[idx].store(new_child.as_ptr(), WRITE_ORD);
                return;
            }
        }
        unreachable!("update of absent edge {key}");
    }

    /// With exactly two pairs, the one not keyed by `key`.
    #[must_use]
    pub(crate) fn remaining(&self, key: u8) -> NodeRef {
        let idx = usize::from(self.keys[0].load(RELAXED) == key);
        NodeRef::from_raw(self.slots[idx].load(RELAXED))
    }

    /// Key at a packed index. Caller holds the node lock.
    #[must_use]
    pub(crate) fn key_at(&self, idx: usize) -> u8 {
        self.keys[idx].load(RELAXED)
    }

    /// Slot at a packed index. Caller holds the node lock.
    #[must_use]
    pub(crate) fn child_at(&self, idx: usize) -> *mut NodeHeader {
        self.slots[idx].load(RELAXED)
    }

    /// Live children for quiescent walks.
    #[must_use]
    pub(crate) fn children(&self) -> Vec<*mut NodeHeader> {
        (0..self.header.count())
            .map(|idx| self.slots[idx].load(RELAXED))
            .filter(|p| !p.is_null())
            .collect()
    }
}

impl Node16 {
    /// SIMD probe for the exact edge `key`.
    #[must_use]
    pub(crate) fn child_simd(&self, key: u8, parent_level: u8) -> Option<NodeRef> {
        'retry: loop {
            let count = self.header.count();
            let mut local = [0_u8; 16];
            for (dst, src) in local.iter_mut().zip(self.keys.iter()) {
                *dst = src.load(READ_ORD);
            }
            let mut mask = eq_mask16(&local, key) & low_mask(count);
            while mask != 0 {
                let idx = 15 - mask.leading_zeros() as usize;
                let child = self.slots[idx].load(READ_ORD);
                if !child.is_null() {
                    let child = NodeRef::from_raw(child);
                    if is_fault(child, key, parent_level) {
                        continue 'retry;
                    }
                    return Some(child);
                }
                mask &= !(1 << idx);
            }
            return None;
        }
    }

    /// SIMD-located delete.
    pub(crate) fn delete_simd(&self, key: u8) {
        let last = self.header.count() - 1;
        if self.keys[last].load(RELAXED) == key {
            self.header.set_count(last);
            self.slots[last].store(ptr::null_mut(), WRITE_ORD);
            return;
        }
        let mut local = [0_u8; 16];
        for (dst, src) in local.iter_mut().zip(self.keys.iter()) {
            *dst = src.load(RELAXED);
        }
        let mask = eq_mask16(&local, key);
        debug_assert_ne!(mask, 0);
        let idx = mask.trailing_zeros() as usize;
        debug_assert!(idx < last);
        self.relocate_last(idx, last);
    }

    /// SIMD-located in-place re-point.
    pub(crate) fn update_simd(&self, key: u8, new_child: NodeRef) {
        let mut local = [0_u8; 16];
        for (dst, src) in local.iter_mut().zip(self.keys.iter()) {
            *dst = src.load(RELAXED);
        }
        let mask = eq_mask16(&local, key) & low_mask(self.header.count());
        debug_assert_ne!(mask, 0);
        let idx = mask.trailing_zeros() as usize;
        debug_assert!(!self.slots[idx].load(RELAXED).is_null());
        self.slots[idx].store(new_child.as_ptr(), WRITE_ORD);
    }
}

/// Mask with the low `count` bits set.
#[inline]
const fn low_mask(count: usize) -> u16 {
    if count >= 16 {
        u16::MAX
    } else {
        (1 << count) - 1
    }
}
