//! Removal paths: list unlink, node shrink, collapse, idempotence.

mod common;

use rangeart::{LeafRef, Lookup, LookupError, RangeArt};

fn exact<'g>(
    tree: &RangeArt<u64>,
    offset: u64,
    guard: &'g seize::LocalGuard<'_>,
) -> LeafRef<'g, u64> {
    match tree.lookup(offset, guard) {
        Ok(Lookup::Match(leaf)) => leaf,
        other => panic!("no range starts at {offset}: {other:?}"),
    }
}

#[test]
fn remove_middle_of_three() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    for offset in [2, 6, 8] {
        tree.insert(offset, 1, offset * 10, 0, &guard);
    }
    tree.remove(exact(&tree, 6, &guard), &guard);

    assert_eq!(tree.ranges(), vec![(2, 1, 20), (8, 1, 80)]);
    // The query point now sits in a gap; the successor answers.
    match tree.lookup(6, &guard) {
        Ok(Lookup::Next(leaf)) => assert_eq!(leaf.offset(), 8),
        other => panic!("expected the successor, got {other:?}"),
    }
}

#[test]
fn removed_range_never_resolves() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(100, 50, 7, 0, &guard);
    tree.insert(300, 50, 8, 0, &guard);
    tree.remove(exact(&tree, 100, &guard), &guard);

    for probe in [100, 125, 149] {
        match tree.lookup(probe, &guard) {
            Ok(Lookup::Next(leaf)) => assert_eq!(leaf.offset(), 300),
            other => panic!("removed range resolved at {probe}: {other:?}"),
        }
    }
}

#[test]
fn remove_last_leaf_then_reuse() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(42, 8, 1, 0, &guard);
    tree.remove(exact(&tree, 42, &guard), &guard);

    assert!(tree.is_empty());
    assert_eq!(tree.lookup(42, &guard).unwrap_err(), LookupError::NotFound);

    // The emptied tree accepts fresh inserts.
    tree.insert(42, 8, 2, 1, &guard);
    assert_eq!(tree.ranges(), vec![(42, 8, 2)]);
}

#[test]
fn remove_is_idempotent() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    tree.insert(10, 5, 1, 0, &guard);
    tree.insert(20, 5, 2, 0, &guard);

    let leaf = exact(&tree, 10, &guard);
    tree.remove(leaf, &guard);
    tree.remove(leaf, &guard);

    assert_eq!(tree.ranges(), vec![(20, 5, 2)]);
}

#[test]
fn collapse_restores_leaf_root() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    // Three siblings under a single node at the deepest level.
    for last in [0x01u64, 0x02, 0x03] {
        tree.insert(0x10_00_00_00_00 | last, 1, last, 0, &guard);
    }
    tree.remove(exact(&tree, 0x10_00_00_00_01, &guard), &guard);
    tree.remove(exact(&tree, 0x10_00_00_00_02, &guard), &guard);

    // The last removal collapsed the node away; the survivor answers alone.
    assert_eq!(tree.leaf_count(), 1);
    assert_eq!(tree.tree_leaf_count(), 1);
    match tree.lookup(0x10_00_00_00_03, &guard) {
        Ok(Lookup::Match(leaf)) => assert_eq!(leaf.payload(), 3),
        other => panic!("survivor missing: {other:?}"),
    }
}

#[test]
fn collapse_chain_keeps_tree_and_list_agreeing() {
    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    // A spread of keys forcing branch points at several levels.
    let keys: &[u64] = &[
        0x00_00_00_00_05,
        0x00_00_00_01_05,
        0x00_00_02_00_05,
        0x03_00_00_00_05,
        0x03_00_00_00_06,
        0x03_00_00_FF_00,
    ];
    for (i, &k) in keys.iter().enumerate() {
        tree.insert(k, 1, i as u64, 0, &guard);
    }
    assert_eq!(tree.leaf_count(), keys.len());

    for &k in keys {
        tree.remove(exact(&tree, k, &guard), &guard);
        assert_eq!(tree.leaf_count(), tree.tree_leaf_count());
    }
    assert!(tree.is_empty());
}

#[test]
fn remove_in_random_order() {
    use rand::seq::SliceRandom;

    common::init_tracing();
    let tree: RangeArt<u64> = RangeArt::new();
    let guard = tree.guard();

    let mut offsets: Vec<u64> = (0..200).map(|i| i * 97).collect();
    for &offset in &offsets {
        tree.insert(offset, 16, offset, 0, &guard);
    }

    let mut rng = rand::rng();
    offsets.shuffle(&mut rng);
    for &offset in &offsets {
        tree.remove(exact(&tree, offset, &guard), &guard);
    }

    assert!(tree.is_empty());
    assert_eq!(tree.lookup(0, &guard).unwrap_err(), LookupError::NotFound);
}
