//! Filepath: src/tree/remove.rs
//!
//! Remove and interior-node collapse.
//!
//! A remove locks the leaf together with its two list neighbors, then
//! descends to the interior node holding the leaf's edge and deletes it
//! under that node's version lock. A node left with a single child is
//! collapsed: the surviving child is promoted into the grandparent (or the
//! root handle) and the node retired.
//!
//! Removal is idempotent. A leaf that was already unlinked is recognized
//! both at the list level (its stale `prev` still points at a predecessor
//! that has moved on) and during the descent (the tree path no longer
//! reaches it); every such case is a silent no-op.

use std::ptr;

use seize::{Guard, LocalGuard};

use crate::key::{byte_at, check_prefix, low_bits, PrefixCmp};
use crate::leaf::{Payload, RangeLeaf};
use crate::node::NodeRef;
use crate::reclaim;
use crate::tracing_helpers::trace_log;
use crate::tree::{LeafRef, RangeArt};
use crate::version::VersionLock;

impl<P: Payload> RangeArt<P> {
    /// Remove a range from the index.
    ///
    /// Safe to call with a leaf a concurrent insert or remove has already
    /// evicted; the call becomes a no-op.
    pub fn remove(&self, leaf: LeafRef<'_, P>, guard: &LocalGuard<'_>) {
        self.do_remove(leaf.as_ptr(), true, guard);
    }

    /// Remove worker. `lock_leaf` is false for calls from the insert
    /// overlap pass, which already holds the leaf run.
    pub(crate) fn do_remove(&self, leaf: *mut RangeLeaf<P>, lock_leaf: bool, guard: &LocalGuard<'_>) {
        // SAFETY: the leaf is live under the caller's guard.
        let (leaf_node, index) = unsafe { ((*leaf).node_ref(), (*leaf).offset()) };
        // SAFETY: as above.
        let mut prev_leaf = unsafe { (*leaf).prev_ptr() };
        // SAFETY: as above.
        let mut next_leaf = unsafe { (*leaf).next_ptr() };
        let mut holds_locks = false;

        if lock_leaf {
            loop {
                // SAFETY: a leaf's predecessor stays readable under the
                // guard even if it was itself removed meanwhile.
                unsafe { (*prev_leaf).lock() };
                // SAFETY: reads under prev's lock.
                let adjacent = unsafe {
                    (*prev_leaf).next_ptr() == leaf && (*leaf).prev_ptr() == prev_leaf
                };
                if adjacent {
                    break;
                }
                // List surgery happens under the predecessor's lock, so a
                // stale forward pointer with an intact back pointer means
                // the leaf was already spliced out.
                // SAFETY: as above.
                let already_unlinked = unsafe { (*leaf).prev_ptr() } == prev_leaf;
                // SAFETY: locked above.
                unsafe { (*prev_leaf).unlock() };
                if already_unlinked {
                    trace_log!("remove no-op: leaf at {index} already unlinked");
                    return;
                }
                // SAFETY: the leaf is live under the guard.
                prev_leaf = unsafe { (*leaf).prev_ptr() };
            }
            // SAFETY: adjacency validated under prev's lock; locking in
            // ascending offset order.
            unsafe {
                (*leaf).lock();
                next_leaf = (*leaf).next_ptr();
                (*next_leaf).lock();
            }
            holds_locks = true;
        }

        'restart: loop {
            let root = self.root_node();

            if root.is_null() {
                // The tree emptied before we got here.
                if holds_locks {
                    // SAFETY: locked above.
                    unsafe { release_run(prev_leaf, leaf, next_leaf) };
                }
                return;
            }

            if root == leaf_node.as_ptr() {
                // The leaf is the whole tree. Swing the root first; the
                // sentinel links reset only once the swing is ours.
                if !self.root_cas(root, ptr::null_mut()) {
                    continue 'restart;
                }
                self.head.set_next(self.tail_ptr());
                self.tail.set_prev(self.head_ptr());
                if holds_locks {
                    // SAFETY: locked above.
                    unsafe { release_run(prev_leaf, leaf, next_leaf) };
                }
                // SAFETY: unlinked; the guard keeps it readable elsewhere.
                unsafe { guard.defer_retire(leaf, reclaim::reclaim_leaf::<P>) };
                return;
            }

            let root_ref = NodeRef::from_raw(root);
            if root_ref.is_leaf() {
                // A different leaf owns the root, so ours is long gone.
                if holds_locks {
                    // SAFETY: locked above.
                    unsafe { release_run(prev_leaf, leaf, next_leaf) };
                }
                return;
            }

            let mut cursor = index;
            let mut level: u8 = 0;
            let mut node_key: u8 = 0;
            let mut node_version: u64 = 0;
            let mut node: Option<NodeRef> = None;
            let mut child = root_ref;

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
                        _ => {
                            // The path diverged, so the leaf was removed.
                            if holds_locks {
                                // SAFETY: locked above.
                                unsafe { release_run(prev_leaf, leaf, next_leaf) };
                            }
                            return;
                        }
                    }
                }

                node_key = byte_at(cursor, level);
                let Some(next_child) = cur.child(node_key) else {
                    if VersionLock::is_obsolete(node_version)
                        || cur.version().has_changed(node_version)
                    {
                        continue 'restart;
                    }
                    // Stable node with no edge for the leaf: already removed.
                    if holds_locks {
                        // SAFETY: locked above.
                        unsafe { release_run(prev_leaf, leaf, next_leaf) };
                    }
                    return;
                };

                if !next_child.is_leaf() {
                    child = next_child;
                    continue;
                }

                if next_child.as_ptr() != leaf_node.as_ptr() {
                    // The slot holds a replacement leaf for the same offset.
                    debug_assert_eq!(next_child.offset(), index);
                    if holds_locks {
                        // SAFETY: locked above.
                        unsafe { release_run(prev_leaf, leaf, next_leaf) };
                    }
                    return;
                }

                if cur.version().lock_version_or_restart(&mut node_version) {
                    continue 'restart;
                }
                debug_assert_ne!(cur.count(), 1);

                if cur.count() == 2 {
                    // Collapse: promote the sibling into the grandparent.
                    let remaining = cur.remaining_child(node_key);
                    match parent {
                        None => {
                            if !self.root_cas(cur.as_ptr(), remaining.as_ptr()) {
                                cur.version().write_unlock();
                                continue 'restart;
                            }
                        }
                        Some(p) => {
                            if p.version().lock_version_or_restart(&mut parent_version) {
                                cur.version().write_unlock();
                                continue 'restart;
                            }
                            p.update_child(parent_key, remaining);
                            p.version().write_unlock();
                        }
                    }
                    cur.version().write_unlock_obsolete();
                    // SAFETY: obsolete and unpublished; readable under guards.
                    unsafe { guard.defer_retire(cur.as_ptr(), reclaim::reclaim_node) };
                } else {
                    cur.delete_child(node_key);
                    cur.version().write_unlock();
                }

                // SAFETY: all three leaves are locked by this call or its
                // caller; the leaf is out of the tree, now out of the list.
                unsafe {
                    (*prev_leaf).set_next(next_leaf);
                    (*next_leaf).set_prev(prev_leaf);
                }
                if holds_locks {
                    // SAFETY: locked above.
                    unsafe { release_run(prev_leaf, leaf, next_leaf) };
                }
                // SAFETY: fully unlinked; the guard keeps it readable.
                unsafe { guard.defer_retire(leaf, reclaim::reclaim_leaf::<P>) };
                return;
            }
        }
    }
}

/// Unlock the remove triple in list order.
///
/// # Safety
/// All three leaves must be locked by the caller.
unsafe fn release_run<P: Payload>(
    prev: *mut RangeLeaf<P>,
    leaf: *mut RangeLeaf<P>,
    next: *mut RangeLeaf<P>,
) {
    // SAFETY: forwarded contract.
    unsafe {
        (*prev).unlock();
        (*leaf).unlock();
        (*next).unlock();
    }
}
