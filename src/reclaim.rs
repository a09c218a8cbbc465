//! Filepath: src/reclaim.rs
//!
//! Deferred reclamation callbacks and quiescent teardown.
//!
//! Structural changes never free memory directly: an unlinked leaf or a
//! node replaced by expansion is handed to the seize collector with the
//! matching callback below, and freed once every guard that could still
//! reach it has retired. Teardown at drop time walks the live tree without
//! deferral; anything still queued in the collector is reclaimed when the
//! collector itself drops.

use seize::Collector;

use crate::leaf::{Payload, RangeLeaf};
use crate::node::direct::Node256;
use crate::node::indexed::Node48;
use crate::node::linear::{Node16, Node4};
use crate::node::{NodeHeader, NodeKind, NodeRef};

/// Reclaim a retired leaf.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` of a `RangeLeaf<P>` and be retired
/// exactly once.
pub(crate) unsafe fn reclaim_leaf<P: Payload>(ptr: *mut RangeLeaf<P>, _collector: &Collector) {
    // SAFETY: forwarded contract.
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Reclaim a retired interior node, dispatching on its kind byte.
///
/// # Safety
/// `ptr` must come from `Box::into_raw` of one of the interior node types
/// and be retired exactly once.
pub(crate) unsafe fn reclaim_node(ptr: *mut NodeHeader, _collector: &Collector) {
    // SAFETY: forwarded contract.
    unsafe { free_interior(ptr) };
}

/// Free an interior node allocation by its kind byte.
///
/// # Safety
/// `ptr` must be a live interior node from `Box::into_raw`, not referenced
/// by anything afterwards.
unsafe fn free_interior(ptr: *mut NodeHeader) {
    // SAFETY: kind is immutable and identifies the allocated type.
    unsafe {
        match (*ptr).kind() {
            NodeKind::N4 => drop(Box::from_raw(ptr.cast::<Node4>())),
            NodeKind::N16 => drop(Box::from_raw(ptr.cast::<Node16>())),
            NodeKind::N48 => drop(Box::from_raw(ptr.cast::<Node48>())),
            NodeKind::N256 => drop(Box::from_raw(ptr.cast::<Node256>())),
            NodeKind::Leaf => unreachable!("leaf retired through the interior callback"),
        }
    }
}

/// Free a whole subtree depth-first. Quiescent only (tree drop).
///
/// # Safety
/// `node` must be a live subtree root no other thread can reach, with all
/// leaves allocated as `RangeLeaf<P>`.
pub(crate) unsafe fn teardown<P: Payload>(node: *mut NodeHeader) {
    let node_ref = NodeRef::from_raw(node);
    if node_ref.is_leaf() {
        // SAFETY: leaves of this tree are RangeLeaf<P> allocations.
        unsafe { drop(Box::from_raw(node.cast::<RangeLeaf<P>>())) };
        return;
    }
    for child in node_ref.children() {
        // SAFETY: children of an unreachable node are unreachable.
        unsafe { teardown::<P>(child) };
    }
    // SAFETY: all children freed above; nothing points here anymore.
    unsafe { free_interior(node) };
}
