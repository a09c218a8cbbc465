//! Insert-wins overlap resolution, exercised through the public API.
//!
//! Every test asserts the final range set both through point lookups and
//! through the quiescent list walk, so a divergence between the tree and
//! the leaf list shows up immediately.

mod common;

use rangeart::{Lookup, LookupError, RangeArt};

fn ranges_of(tree: &RangeArt<u64>) -> Vec<(u64, u64, u64)> {
    assert_eq!(tree.leaf_count(), tree.tree_leaf_count());
    tree.ranges()
}

#[test]
fn trisection_of_a_covering_range() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(0, 10, 100, 1, &guard);
    tree.insert(5, 8 - 5, 200, 2, &guard);

    // [0,10)A split by [5,8)B: front keeps A, the tail survives with A's
    // payload advanced by the 8 bytes cut off its front.
    assert_eq!(
        ranges_of(&tree),
        vec![(0, 5, 100), (5, 3, 200), (8, 2, 108)]
    );

    match tree.lookup(8, &guard) {
        Ok(Lookup::Match(leaf)) => {
            assert_eq!(leaf.payload(), 108);
            assert_eq!(leaf.tx_id(), 1);
        }
        other => panic!("expected the remainder, got {other:?}"),
    }
}

#[test]
fn tail_truncation() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(0, 10, 100, 1, &guard);
    tree.insert(8, 12, 200, 2, &guard);

    assert_eq!(ranges_of(&tree), vec![(0, 8, 100), (8, 12, 200)]);
}

#[test]
fn head_trim_without_remainder() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    // The new range ends exactly where the old one did, so no remainder.
    tree.insert(0, 10, 100, 1, &guard);
    tree.insert(5, 5, 200, 2, &guard);

    assert_eq!(ranges_of(&tree), vec![(0, 5, 100), (5, 5, 200)]);
}

#[test]
fn full_eviction_of_covered_ranges() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(10, 4, 1, 0, &guard);
    tree.insert(14, 4, 2, 0, &guard);
    tree.insert(18, 4, 3, 0, &guard);
    tree.insert(8, 16, 9, 0, &guard);

    assert_eq!(ranges_of(&tree), vec![(8, 16, 9)]);
    for probe in [10, 15, 21] {
        match tree.lookup(probe, &guard) {
            Ok(Lookup::Prev(leaf)) => assert_eq!(leaf.payload(), 9),
            other => panic!("expected the covering range at {probe}, got {other:?}"),
        }
    }
}

#[test]
fn straddler_keeps_its_tail() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(0, 10, 100, 1, &guard);
    tree.insert(20, 10, 300, 3, &guard);
    tree.insert(5, 20, 200, 2, &guard);

    // [20,30) straddles the new end at 25: its tail survives advanced.
    assert_eq!(
        ranges_of(&tree),
        vec![(0, 5, 100), (5, 20, 200), (25, 5, 305)]
    );
}

#[test]
fn exact_overwrite_discards_the_old_range_entirely() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(100, 10, 1, 1, &guard);
    tree.insert(100, 4, 2, 2, &guard);

    // An exact-offset insert supersedes the whole old range; the old tail
    // [104,110) does not survive.
    assert_eq!(ranges_of(&tree), vec![(100, 4, 2)]);
    assert_eq!(
        tree.lookup(105, &guard).unwrap_err(),
        LookupError::NotFound
    );
}

#[test]
fn abutting_ranges_do_not_disturb_each_other() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(0, 10, 1, 0, &guard);
    tree.insert(10, 10, 2, 0, &guard);
    tree.insert(20, 10, 3, 0, &guard);

    assert_eq!(
        ranges_of(&tree),
        vec![(0, 10, 1), (10, 10, 2), (20, 10, 3)]
    );
}

#[test]
fn overwrite_with_wider_range_sweeps_successors() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(100, 10, 1, 0, &guard);
    tree.insert(110, 10, 2, 0, &guard);
    tree.insert(120, 10, 3, 0, &guard);
    // Same offset as the first range, wide enough to evict the second and
    // split the third.
    tree.insert(100, 25, 9, 0, &guard);

    assert_eq!(ranges_of(&tree), vec![(100, 25, 9), (125, 5, 8)]);
}

#[test]
fn overlap_across_distant_prefixes() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    // Ranges on both sides of a high-level branch point.
    tree.insert(0x01_00_00_FF_00, 0x100, 1, 0, &guard);
    tree.insert(0x01_00_01_00_80, 0x100, 2, 0, &guard);
    // Covers the first's tail and the second entirely.
    tree.insert(0x01_00_00_FF_80, 0x300, 3, 0, &guard);

    assert_eq!(
        ranges_of(&tree),
        vec![(0x01_00_00_FF_00, 0x80, 1), (0x01_00_00_FF_80, 0x300, 3)]
    );
}

#[test]
fn zero_length_point_is_inert() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(50, 20, 1, 0, &guard);
    tree.insert(60, 0, 2, 0, &guard);

    // The point indexes without trimming its host.
    assert_eq!(ranges_of(&tree), vec![(50, 20, 1), (60, 0, 2)]);

    // A later covering insert evicts the point like any covered leaf.
    tree.insert(55, 10, 3, 0, &guard);
    assert_eq!(
        ranges_of(&tree),
        vec![(50, 5, 1), (55, 10, 3), (65, 5, 16)]
    );
}
