//! Filepath: src/tree/insert.rs
//!
//! Insert and the insert-wins overlap pass.
//!
//! An insert allocates its leaf locked, descends optimistically, and ends
//! in one of four terminal paths: empty tree, branch point (the key
//! diverges from a compressed prefix), overwrite (a leaf already owns the
//! exact offset), or empty slot in an interior node. Each path first locks
//! the run of leaves the new range can touch, then upgrades the one or two
//! node version snapshots it mutates. Any conflict restarts from the root;
//! an already-acquired leaf run survives restarts and is released once by
//! the final unlock pass.
//!
//! # Leaf run protocol
//! `lock_leaf_run_or_restart` locks `prev`, validates the `prev`/`next`
//! adjacency, then walks forward locking every leaf until it holds the
//! first one starting at or past `index + length`. That leaf is the run
//! stop; `unlock_leaf_run` later walks `prev -> stop` through the (by
//! then possibly shortened) chain, which also releases leaves the overlap
//! pass inserted mid-run still holding their allocation lock.
//!
//! # Overlap pass
//! `link_and_remove` runs after the new leaf is published: it trims a
//! predecessor that reaches into the new range, removes fully covered
//! leaves, and re-inserts the tail of a straddling leaf past the new end
//! with its payload advanced. Zero-length ranges index a point and leave
//! their neighbors untouched.

use std::ptr;

use seize::{Guard, LocalGuard};

use crate::key::{
    byte_at, check_prefix, in_bounds, low_bits, prefix_of, PrefixCmp, ENTRY_BITS, KEY_BYTES,
    KEY_LIMIT,
};
use crate::leaf::{leaf_from_node, Payload, RangeLeaf};
use crate::node::linear::Node4;
use crate::node::{NodeRef, RangeHit};
use crate::reclaim;
use crate::tracing_helpers::trace_log;
use crate::tree::RangeArt;

impl<P: Payload> RangeArt<P> {
    /// Index the range `[offset, offset + length)` under `payload`.
    ///
    /// Overlap resolves in favor of this insert: covered parts of older
    /// ranges are trimmed or evicted, and a surviving tail is re-indexed
    /// with its payload advanced by [`Payload::offset_by`]. `length == 0`
    /// indexes a point without disturbing any neighbor. Offsets must fit
    /// the 40-bit keyspace; a length reaching past its end is clamped.
    pub fn insert(&self, offset: u64, length: u64, payload: P, tx_id: i32, guard: &LocalGuard<'_>) {
        debug_assert!(in_bounds(offset), "offset beyond the 40-bit keyspace");
        self.do_insert(offset, length, payload, tx_id, true, guard);
    }

    /// Insert worker. `lock_leaf_entry` is false for the recursive calls
    /// made by the overlap pass, which already hold the leaf run.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn do_insert(
        &self,
        index: u64,
        length: u64,
        payload: P,
        tx_id: i32,
        lock_leaf_entry: bool,
        guard: &LocalGuard<'_>,
    ) {
        debug_assert!(in_bounds(index));
        // Stored leaves never extend past the keyspace, so the overlap pass
        // can never re-index a tail at or beyond the sentinels.
        let length = length.min(KEY_LIMIT - index);

        let new_leaf = Box::into_raw(RangeLeaf::boxed(index, length, payload, tx_id));
        // SAFETY: fresh allocation. The leaf stays locked until the final
        // unlock pass walks over it.
        unsafe { (*new_leaf).lock() };
        // SAFETY: as above.
        let new_node = unsafe { (*new_leaf).node_ref() };

        let mut lock_leaf = lock_leaf_entry;
        let mut unlock_run = false;
        let mut run_stop: *mut RangeLeaf<P> = ptr::null_mut();

        'restart: loop {
            let root = self.root_node();

            if root.is_null() {
                // The new leaf becomes the root, chained between the
                // sentinels. Holding both sentinel locks excludes every
                // competing first insert, so the publish cannot fail.
                // SAFETY: the leaf is ours until published.
                unsafe {
                    (*new_leaf).set_prev(self.head_ptr());
                    (*new_leaf).set_next(self.tail_ptr());
                }
                if lock_leaf {
                    self.head.lock();
                    if self.head.next_ptr() != self.tail_ptr() {
                        // SAFETY: locked just above.
                        unsafe { self.head.unlock() };
                        continue 'restart;
                    }
                    self.tail.lock();
                    unlock_run = true;
                    run_stop = self.tail_ptr();
                }
                self.head.set_next(new_leaf);
                self.tail.set_prev(new_leaf);
                let installed = self.root_cas(ptr::null_mut(), new_node.as_ptr());
                debug_assert!(installed, "first insert raced under the sentinel locks");
                if unlock_run {
                    // SAFETY: the run head..=stop was locked above.
                    unsafe { unlock_leaf_run(self.head_ptr(), run_stop) };
                }
                return;
            }

            let mut cursor = index;
            let mut level: u8 = 0;
            let mut node_key: u8 = 0;
            let mut node_version: u64 = 0;
            let mut node: Option<NodeRef> = None;
            let mut child = NodeRef::from_raw(root);

            loop {
                let parent = node;
                let mut parent_version = node_version;
                let parent_key = node_key;
                let cur = child;
                node = Some(cur);
                node_version = cur.version().load();

                if level != cur.level() {
                    debug_assert!(level < cur.level());
                    match check_prefix(cursor, cur.offset(), level, cur.level()) {
                        PrefixCmp::Match => {
                            level = cur.level();
                            cursor = low_bits(cursor, level);
                        }
                        cmp => {
                            // Branch point: the key diverges inside this
                            // subtree's compressed prefix. A fresh N4 takes
                            // over the edge with the subtree and the new
                            // leaf as its two children.
                            let (prev_leaf, next_leaf) = match cmp {
                                PrefixCmp::Prev => {
                                    let Some(p) = rightmost_leaf::<P>(cur) else {
                                        continue 'restart;
                                    };
                                    // SAFETY: live under the guard.
                                    (p, unsafe { (*p).next_ptr() })
                                }
                                _ => {
                                    let Some(n) = leftmost_leaf::<P>(cur) else {
                                        continue 'restart;
                                    };
                                    // SAFETY: live under the guard.
                                    (unsafe { (*n).prev_ptr() }, n)
                                }
                            };
                            // SAFETY: both neighbors live under the guard.
                            if unsafe { range_conflict(prev_leaf, next_leaf, index) } {
                                continue 'restart;
                            }

                            let level_diff = cur.level() - level;
                            let cur_prefix =
                                cursor >> (u32::from(KEY_BYTES - cur.level()) * ENTRY_BITS);
                            let node_span = cur.offset()
                                & ((1_u64 << (u32::from(level_diff) * ENTRY_BITS)) - 1);
                            let mut match_len = level_diff - 1;
                            while match_len > 0 {
                                let shift = u32::from(level_diff - match_len) * ENTRY_BITS;
                                if cur_prefix >> shift == node_span >> shift {
                                    break;
                                }
                                match_len -= 1;
                            }

                            let branch_level = level + match_len;
                            let branch = Node4::boxed(branch_level, prefix_of(index, branch_level));
                            let branch_ref = NodeRef::from_raw(Box::into_raw(branch).cast());
                            let edge_shift =
                                u32::from(level_diff - 1 - match_len) * ENTRY_BITS;
                            branch_ref.insert_child_force((node_span >> edge_shift) as u8, cur);
                            branch_ref
                                .insert_child_force((cur_prefix >> edge_shift) as u8, new_node);

                            if lock_leaf {
                                // SAFETY: neighbors live under the guard.
                                match unsafe {
                                    lock_leaf_run_or_restart(prev_leaf, next_leaf, index, length)
                                } {
                                    None => {
                                        // SAFETY: never published.
                                        unsafe { free_scratch_n4(branch_ref) };
                                        continue 'restart;
                                    }
                                    Some(stop) => {
                                        run_stop = stop;
                                        lock_leaf = false;
                                        unlock_run = true;
                                    }
                                }
                            }
                            if cur.version().lock_version_or_restart(&mut node_version) {
                                // SAFETY: never published.
                                unsafe { free_scratch_n4(branch_ref) };
                                continue 'restart;
                            }
                            let parent_locked = match parent {
                                None => !self.root_lock_or_restart(cur.as_ptr()),
                                Some(p) => {
                                    !p.version().lock_version_or_restart(&mut parent_version)
                                }
                            };
                            if !parent_locked {
                                cur.version().write_unlock();
                                // SAFETY: never published.
                                unsafe { free_scratch_n4(branch_ref) };
                                continue 'restart;
                            }

                            // SAFETY: all four leaves are locked or ours.
                            unsafe {
                                (*new_leaf).set_prev(prev_leaf);
                                (*new_leaf).set_next(next_leaf);
                                (*prev_leaf).set_next(new_leaf);
                                (*next_leaf).set_prev(new_leaf);
                            }
                            match parent {
                                None => self.root_swing(branch_ref.as_ptr()),
                                Some(p) => {
                                    p.update_child(parent_key, branch_ref);
                                    p.version().write_unlock();
                                }
                            }
                            cur.version().write_unlock();
                            // SAFETY: leaf run held, new leaf published.
                            unsafe {
                                self.link_and_remove(
                                    index, length, new_leaf, prev_leaf, next_leaf, guard,
                                );
                                if unlock_run {
                                    unlock_leaf_run(prev_leaf, run_stop);
                                }
                            }
                            return;
                        }
                    }
                }

                if cur.is_leaf() {
                    // Overwrite: a leaf already owns this exact offset. The
                    // new leaf slides in before it, takes its tree slot,
                    // then the old leaf is spliced out and retired.
                    // SAFETY: reached through the tree under the guard.
                    let old = unsafe { leaf_from_node::<P>(cur.as_ptr()) };
                    // SAFETY: as above.
                    let prev_leaf = unsafe {
                        debug_assert_eq!((*old).offset(), index);
                        (*old).prev_ptr()
                    };
                    if lock_leaf {
                        // SAFETY: neighbors live under the guard.
                        match unsafe { lock_leaf_run_or_restart(prev_leaf, old, index, length) } {
                            None => continue 'restart,
                            Some(stop) => {
                                run_stop = stop;
                                lock_leaf = false;
                                unlock_run = true;
                            }
                        }
                    }
                    let parent_locked = match parent {
                        None => !self.root_lock_or_restart(cur.as_ptr()),
                        Some(p) => !p.version().lock_version_or_restart(&mut parent_version),
                    };
                    if !parent_locked {
                        trace_log!("insert restart: overwrite lost the parent at {index}");
                        continue 'restart;
                    }

                    // SAFETY: prev and old are locked, the new leaf is ours.
                    unsafe {
                        (*new_leaf).set_prev(prev_leaf);
                        (*new_leaf).set_next(old);
                        (*prev_leaf).set_next(new_leaf);
                        (*old).set_prev(new_leaf);
                    }
                    match parent {
                        None => self.root_swing(new_node.as_ptr()),
                        Some(p) => {
                            p.update_child(parent_key, new_node);
                            p.version().write_unlock();
                        }
                    }
                    // SAFETY: old is locked and no longer in the tree; the
                    // guard keeps it readable for concurrent lookups.
                    unsafe {
                        let after = (*old).next_ptr();
                        (*new_leaf).set_next(after);
                        (*after).set_prev(new_leaf);
                        if unlock_run {
                            if run_stop == old {
                                run_stop = new_leaf;
                            }
                            (*old).unlock();
                        }
                        guard.defer_retire(old, reclaim::reclaim_leaf::<P>);
                        let next_leaf = (*new_leaf).next_ptr();
                        self.link_and_remove(index, length, new_leaf, prev_leaf, next_leaf, guard);
                        if unlock_run {
                            unlock_leaf_run(prev_leaf, run_stop);
                        }
                    }
                    return;
                }

                node_key = byte_at(cursor, level);
                if let Some(next_child) = cur.child(node_key) {
                    child = next_child;
                    level += 1;
                    cursor = low_bits(cursor, level);
                    continue;
                }

                // Empty slot: the edge byte is free in this node. Find the
                // list position through the nearest occupied edge, then
                // claim the slot, growing the node if it is full.
                let Some((hit, near)) = cur.child_range(node_key) else {
                    continue 'restart;
                };
                let (prev_leaf, next_leaf) = match hit {
                    RangeHit::Prev => {
                        let Some(p) = rightmost_leaf::<P>(near) else {
                            continue 'restart;
                        };
                        // SAFETY: live under the guard.
                        (p, unsafe { (*p).next_ptr() })
                    }
                    RangeHit::Next => {
                        let Some(n) = leftmost_leaf::<P>(near) else {
                            continue 'restart;
                        };
                        // SAFETY: live under the guard.
                        (unsafe { (*n).prev_ptr() }, n)
                    }
                    // The edge filled in while we probed.
                    RangeHit::Match => continue 'restart,
                };
                // SAFETY: both neighbors live under the guard.
                if unsafe { range_conflict(prev_leaf, next_leaf, index) } {
                    continue 'restart;
                }
                let need_expand = cur.need_expand();

                if lock_leaf {
                    // SAFETY: neighbors live under the guard.
                    match unsafe { lock_leaf_run_or_restart(prev_leaf, next_leaf, index, length) } {
                        None => continue 'restart,
                        Some(stop) => {
                            run_stop = stop;
                            lock_leaf = false;
                            unlock_run = true;
                        }
                    }
                }
                if cur.version().lock_version_or_restart(&mut node_version) {
                    continue 'restart;
                }
                if need_expand {
                    let parent_locked = match parent {
                        None => !self.root_lock_or_restart(cur.as_ptr()),
                        Some(p) => !p.version().lock_version_or_restart(&mut parent_version),
                    };
                    if !parent_locked {
                        cur.version().write_unlock();
                        continue 'restart;
                    }
                }

                // SAFETY: prev and next are locked, the new leaf is ours.
                unsafe {
                    (*new_leaf).set_prev(prev_leaf);
                    (*new_leaf).set_next(next_leaf);
                    (*prev_leaf).set_next(new_leaf);
                    (*next_leaf).set_prev(new_leaf);
                }

                if cur.insert_child(node_key, new_node) {
                    debug_assert!(!need_expand);
                    cur.version().write_unlock();
                } else {
                    debug_assert!(need_expand);
                    let grown = cur.expand();
                    grown.insert_child_force(node_key, new_node);
                    match parent {
                        None => self.root_swing(grown.as_ptr()),
                        Some(p) => {
                            p.update_child(parent_key, grown);
                            p.version().write_unlock();
                        }
                    }
                    cur.version().write_unlock_obsolete();
                    // SAFETY: the node is obsolete; the guard keeps it
                    // readable for in-flight optimistic readers.
                    unsafe { guard.defer_retire(cur.as_ptr(), reclaim::reclaim_node) };
                }
                // SAFETY: leaf run held, new leaf published.
                unsafe {
                    self.link_and_remove(index, length, new_leaf, prev_leaf, next_leaf, guard);
                    if unlock_run {
                        unlock_leaf_run(prev_leaf, run_stop);
                    }
                }
                return;
            }
        }
    }

    /// Resolve overlap after `new_leaf` is published. Caller holds the leaf
    /// run covering `[index, index + length)`.
    ///
    /// # Safety
    /// `new_leaf` is published and locked; `prev_leaf` and `next_leaf` are
    /// its locked list neighbors from the insert, and every leaf up to the
    /// run stop is locked.
    unsafe fn link_and_remove(
        &self,
        index: u64,
        length: u64,
        new_leaf: *mut RangeLeaf<P>,
        prev_leaf: *mut RangeLeaf<P>,
        next_leaf: *mut RangeLeaf<P>,
        guard: &LocalGuard<'_>,
    ) {
        if length == 0 {
            // A point range claims no bytes.
            return;
        }
        let end = index.saturating_add(length).min(KEY_LIMIT);
        // SAFETY: locked by the caller's run.
        let prev = unsafe { &*prev_leaf };

        if !prev.is_sentinel() {
            let prev_end = prev.end();
            if prev_end > end {
                // The new range punches a hole in prev: keep the front in
                // place, re-insert the tail past the hole. Point leaves
                // caught inside the hole are still swept by the loop below.
                // SAFETY: locked by the caller's run.
                unsafe { (*next_leaf).set_prev(new_leaf) };
                let delta = end - prev.offset();
                prev.set_length(index - prev.offset());
                self.do_insert(
                    end,
                    prev_end - end,
                    prev.payload().offset_by(delta),
                    prev.tx_id(),
                    false,
                    guard,
                );
            } else if prev_end > index {
                prev.set_length(index - prev.offset());
            }
        }

        // SAFETY: the chain from new_leaf to the run stop is locked.
        let mut leaf = unsafe { (*new_leaf).next_ptr() };
        loop {
            // SAFETY: locked by the caller's run; stays readable under the
            // guard after removal.
            let leaf_ref = unsafe { &*leaf };
            if leaf_ref.offset() >= end {
                // First leaf past the new range; the run stop at the latest.
                return;
            }
            if leaf_ref.end() <= end {
                // Fully covered.
                let next = leaf_ref.next_ptr();
                self.do_remove(leaf, false, guard);
                // SAFETY: locked by the caller's run, now out of the chain.
                unsafe { leaf_ref.unlock() };
                leaf = next;
                continue;
            }
            // Straddler: re-index its tail past end, then drop it.
            let delta = end - leaf_ref.offset();
            self.do_insert(
                end,
                leaf_ref.end() - end,
                leaf_ref.payload().offset_by(delta),
                leaf_ref.tx_id(),
                false,
                guard,
            );
            self.do_remove(leaf, false, guard);
            // SAFETY: locked by the caller's run, now out of the chain.
            unsafe { leaf_ref.unlock() };
            return;
        }
    }
}

/// Descend to the smallest leaf of a subtree.
///
/// `None` means a torn node; the caller restarts.
pub(super) fn leftmost_leaf<P: Payload>(start: NodeRef) -> Option<*mut RangeLeaf<P>> {
    let mut node = start;
    while !node.is_leaf() {
        let (_, next) = node.child_range(0)?;
        node = next;
    }
    // SAFETY: kind checked by the loop.
    Some(unsafe { leaf_from_node::<P>(node.as_ptr()) })
}

/// Descend to the largest leaf of a subtree.
pub(super) fn rightmost_leaf<P: Payload>(start: NodeRef) -> Option<*mut RangeLeaf<P>> {
    let mut node = start;
    while !node.is_leaf() {
        let (_, next) = node.child_range(0xFF)?;
        node = next;
    }
    // SAFETY: kind checked by the loop.
    Some(unsafe { leaf_from_node::<P>(node.as_ptr()) })
}

/// Whether the discovered neighbors no longer bracket `index`.
///
/// # Safety
/// Both leaves must be live (reachable under the caller's guard).
unsafe fn range_conflict<P: Payload>(
    prev: *mut RangeLeaf<P>,
    next: *mut RangeLeaf<P>,
    index: u64,
) -> bool {
    // SAFETY: forwarded contract.
    let (prev, next) = unsafe { (&*prev, &*next) };
    (!prev.is_sentinel() && prev.offset() >= index) || next.offset() <= index
}

/// Lock the run of leaves an insert of `[index, index + length)` can touch.
///
/// Locks `prev`, re-validates the `prev`/`next` adjacency, then walks
/// forward locking every leaf until one starts at or past the range end.
///
/// # Returns
/// The run stop (first leaf at or past the end, locked), or `None` with
/// nothing held if the adjacency no longer holds. Termination is bounded
/// by the tail sentinel at [`KEY_LIMIT`].
///
/// # Safety
/// `prev` and `next` must be live leaves discovered as adjacent.
unsafe fn lock_leaf_run_or_restart<P: Payload>(
    prev: *mut RangeLeaf<P>,
    next: *mut RangeLeaf<P>,
    index: u64,
    length: u64,
) -> Option<*mut RangeLeaf<P>> {
    let end = index.saturating_add(length).min(KEY_LIMIT);
    // SAFETY: forwarded contract.
    let prev_ref = unsafe { &*prev };

    prev_ref.lock();
    // SAFETY: forwarded contract.
    if prev_ref.next_ptr() != next || unsafe { (*next).prev_ptr() } != prev {
        // SAFETY: locked just above.
        unsafe { prev_ref.unlock() };
        return None;
    }

    let mut cur = next;
    // SAFETY: adjacency validated under prev's lock keeps cur live.
    unsafe { (*cur).lock() };
    loop {
        // SAFETY: locked; a locked leaf cannot be unlinked.
        let cur_ref = unsafe { &*cur };
        if cur_ref.offset() >= end {
            return Some(cur);
        }
        cur = cur_ref.next_ptr();
        // SAFETY: successor of a locked leaf is live.
        unsafe { (*cur).lock() };
    }
}

/// Release a locked run from `begin` through `stop` inclusive, following
/// the current chain.
///
/// # Safety
/// Every leaf on the chain from `begin` to `stop` must be locked by the
/// caller's operation, with `stop` reachable from `begin`.
pub(super) unsafe fn unlock_leaf_run<P: Payload>(
    begin: *mut RangeLeaf<P>,
    stop: *mut RangeLeaf<P>,
) {
    let mut cur = begin;
    loop {
        // SAFETY: forwarded contract; the next pointer is read before the
        // unlock hands the leaf to other writers.
        let next = unsafe { (*cur).next_ptr() };
        // SAFETY: forwarded contract.
        unsafe { (*cur).unlock() };
        if cur == stop {
            return;
        }
        cur = next;
    }
}

/// Free a branch node that was never published.
///
/// # Safety
/// `branch` must be an N4 from `Box::into_raw` that no other thread saw.
unsafe fn free_scratch_n4(branch: NodeRef) {
    // SAFETY: forwarded contract.
    unsafe { drop(Box::from_raw(branch.as_ptr().cast::<Node4>())) };
}

#[cfg(test)]
mod tests {
    use crate::key::KEY_LIMIT;
    use crate::tree::{Lookup, RangeArt};

    /// Offsets sharing all prefix bytes force branch points at the last
    /// level; distant offsets force them near the root.
    #[test]
    fn test_branch_points_at_both_ends() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        tree.insert(0x01_02_03_04_05, 1, 1, 0, &guard);
        tree.insert(0x01_02_03_04_99, 1, 2, 0, &guard);
        tree.insert(0xEE_00_00_00_00, 1, 3, 0, &guard);

        assert_eq!(tree.leaf_count(), 3);
        assert_eq!(tree.tree_leaf_count(), 3);
        for (offset, payload) in [
            (0x01_02_03_04_05_u64, 1),
            (0x01_02_03_04_99, 2),
            (0xEE_00_00_00_00, 3),
        ] {
            match tree.lookup(offset, &guard) {
                Ok(Lookup::Match(leaf)) => assert_eq!(leaf.payload(), payload),
                other => panic!("expected match at {offset:#x}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_overwrite_same_offset() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        tree.insert(500, 10, 1, 1, &guard);
        tree.insert(500, 4, 2, 2, &guard);

        assert_eq!(tree.leaf_count(), 1);
        match tree.lookup(500, &guard) {
            Ok(Lookup::Match(leaf)) => {
                assert_eq!(leaf.length(), 4);
                assert_eq!(leaf.payload(), 2);
                assert_eq!(leaf.tx_id(), 2);
            }
            other => panic!("expected the newer range, got {other:?}"),
        }
    }

    /// Filling one byte level drives N4 -> N16 -> N48 -> N256 expansion.
    #[test]
    fn test_node_growth_under_one_prefix() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        for byte in 0..=255_u64 {
            tree.insert(0x0A_00_00_00_00 | byte, 1, byte, 0, &guard);
        }
        assert_eq!(tree.leaf_count(), 256);
        assert_eq!(tree.tree_leaf_count(), 256);
        for byte in [0_u64, 3, 47, 48, 200, 255] {
            match tree.lookup(0x0A_00_00_00_00 | byte, &guard) {
                Ok(Lookup::Match(leaf)) => assert_eq!(leaf.payload(), byte),
                other => panic!("expected match for byte {byte}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_last_valid_offset() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        // A range at the top of the keyspace saturates against the limit.
        tree.insert(KEY_LIMIT - 1, 100, 9, 0, &guard);
        match tree.lookup(KEY_LIMIT - 1, &guard) {
            Ok(Lookup::Match(leaf)) => {
                assert_eq!(leaf.end(), KEY_LIMIT);
                assert_eq!(leaf.payload(), 9);
            }
            other => panic!("expected match at the limit, got {other:?}"),
        }
    }

    #[test]
    fn test_overlap_at_the_keyspace_limit() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        // Both lengths saturate at the limit; the second range fully
        // covers what survives of the first.
        tree.insert(KEY_LIMIT - 1, 100, 9, 0, &guard);
        tree.insert(KEY_LIMIT - 2, 2, 10, 1, &guard);

        assert_eq!(tree.leaf_count(), 1);
        match tree.lookup(KEY_LIMIT - 1, &guard) {
            Ok(Lookup::Prev(leaf)) => {
                assert_eq!(leaf.offset(), KEY_LIMIT - 2);
                assert_eq!(leaf.end(), KEY_LIMIT);
            }
            other => panic!("expected the covering range, got {other:?}"),
        }
    }

    #[test]
    fn test_point_range_inside_existing() {
        let tree: RangeArt<u64> = RangeArt::new();
        let guard = tree.guard();
        tree.insert(100, 50, 1, 0, &guard);
        // A zero-length insert lands between neighbors without trimming.
        tree.insert(120, 0, 2, 0, &guard);

        assert_eq!(tree.leaf_count(), 2);
        match tree.lookup(120, &guard) {
            Ok(Lookup::Match(leaf)) => {
                assert_eq!(leaf.offset(), 120);
                assert_eq!(leaf.length(), 0);
                assert_eq!(leaf.payload(), 2);
            }
            other => panic!("expected the point leaf, got {other:?}"),
        }
        // The host range is untouched.
        match tree.lookup(110, &guard) {
            Ok(Lookup::Prev(leaf)) => {
                assert_eq!(leaf.offset(), 100);
                assert_eq!(leaf.length(), 50);
            }
            other => panic!("expected the host range, got {other:?}"),
        }
    }
}
