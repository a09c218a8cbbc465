//! Filepath: src/node/direct.rs
//!
//! 256-slot direct node: one slot per possible edge byte, plus a presence
//! bitmap so neighbor scans skip empty runs without touching 256 pointers.
//!
//! The edge byte addresses its slot directly, so probes need no recycled-
//! slot re-check: a non-null pointer in slot `k` is always the child for
//! `k`.

use std::ptr;
use std::sync::atomic::AtomicPtr;

use crate::bitmap::{ascending_from, descending_from, Bitmap256};
use crate::node::{NodeHeader, NodeKind, NodeRef, RangeHit};
use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};

/// Interior node with a direct slot per edge byte.
#[derive(Debug)]
#[repr(C)]
pub struct Node256 {
    pub(crate) header: NodeHeader,
    slots: [AtomicPtr<NodeHeader>; 256],
    presence: Bitmap256,
}

impl Node256 {
    /// Allocate an empty node owning `offset` at `level`.
    #[must_use]
    pub fn boxed(level: u8, offset: u64) -> Box<Self> {
        Box::new(Self {
            header: NodeHeader::new(NodeKind::N256, level, offset),
            slots: [const { AtomicPtr::new(ptr::null_mut()) }; 256],
            presence: Bitmap256::new(),
        })
    }

    /// Probe the exact edge `key`.
    #[must_use]
    pub(crate) fn child(&self, key: u8) -> Option<NodeRef> {
        let child = self.slots[usize::from(key)].load(READ_ORD);
        (!child.is_null()).then(|| NodeRef::from_raw(child))
    }

    /// Child on edge `key`, or the nearest occupied neighbor.
    #[must_use]
    pub(crate) fn child_range(&self, key: u8) -> Option<(RangeHit, NodeRef)> {
        if let Some(child) = self.child(key) {
            return Some((RangeHit::Match, child));
        }

        let snap = self.presence.snapshot();
        for k in descending_from(snap, key) {
            let child = self.slots[usize::from(k)].load(READ_ORD);
            if !child.is_null() {
                return Some((RangeHit::Prev, NodeRef::from_raw(child)));
            }
        }
        for k in ascending_from(snap, key) {
            let child = self.slots[usize::from(k)].load(READ_ORD);
            if !child.is_null() {
                return Some((RangeHit::Next, NodeRef::from_raw(child)));
            }
        }
        None
    }

    /// Add a child on edge `key`. Caller holds the node lock. Never full.
    pub(crate) fn insert(&self, key: u8, child: NodeRef) -> bool {
        debug_assert!(self.slots[usize::from(key)].load(RELAXED).is_null());
        self.slots[usize::from(key)].store(child.as_ptr(), WRITE_ORD);
        self.presence.set(key);
        self.header.set_count(self.header.count() + 1);
        true
    }

    /// Add a child to an unpublished node.
    pub(crate) fn insert_force(&self, key: u8, child: NodeRef) {
        self.slots[usize::from(key)].store(child.as_ptr(), RELAXED);
        self.presence.set(key);
        self.header.set_count(self.header.count() + 1);
    }

    /// Remove the child on edge `key`. Caller holds the node lock.
    pub(crate) fn delete(&self, key: u8) {
        debug_assert!(!self.slots[usize::from(key)].load(RELAXED).is_null());
        self.presence.clear(key);
        self.slots[usize::from(key)].store(ptr::null_mut(), WRITE_ORD);
        self.header.set_count(self.header.count() - 1);
    }

    /// Re-point the occupied edge `key`. Caller holds the node lock.
    pub(crate) fn update(&self, key: u8, new_child: NodeRef) {
        debug_assert!(!self.slots[usize::from(key)].load(RELAXED).is_null());
        self.slots[usize::from(key)].store(new_child.as_ptr(), WRITE_ORD);
    }

    /// With exactly two children, the one not on edge `key`. Caller holds
    /// the node lock.
    #[must_use]
    pub(crate) fn remaining(&self, key: u8) -> NodeRef {
        for k in ascending_from(self.presence.snapshot(), 0) {
            if k != key {
                return NodeRef::from_raw(self.slots[usize::from(k)].load(RELAXED));
            }
        }
        unreachable!("no sibling beside edge {key}");
    }

    /// Live children for quiescent walks.
    #[must_use]
    pub(crate) fn children(&self) -> Vec<*mut NodeHeader> {
        ascending_from(self.presence.snapshot(), 0)
            .map(|k| self.slots[usize::from(k)].load(RELAXED))
            .filter(|p| !p.is_null())
            .collect()
    }
}
