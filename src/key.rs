//! Filepath: src/key.rs
//!
//! 40-bit key arithmetic for the radix tree.
//!
//! Keys are logical byte offsets below `2^40`, consumed one byte per tree
//! level from most significant to least. Levels `0..=4` are interior levels;
//! [`LEAF_LEVEL`] (5) marks a leaf. An interior node at level `L` owns the
//! key prefix `index >> ((5 - L) * 8)`, stored in its header, which is how
//! path compression skips levels with a single descendant.
//!
//! The traversal cursor holds the low `40 - 8 * level` bits of the search
//! key; [`check_prefix`] compares it against a compressed prefix and reports
//! which side of the subtree the key falls on.

/// Bits consumed per tree level.
pub const ENTRY_BITS: u32 = 8;

/// Number of key bytes (40-bit keyspace).
pub const KEY_BYTES: u8 = 5;

/// Deepest interior level.
pub const MAX_LEVEL: u8 = KEY_BYTES - 1;

/// Level value marking a leaf.
pub const LEAF_LEVEL: u8 = KEY_BYTES;

/// One past the largest valid key. Sentinel leaves carry this offset, so it
/// also serves as "plus infinity" in list walks.
pub const KEY_LIMIT: u64 = 1 << (KEY_BYTES as u32 * ENTRY_BITS);

/// Whether `index` fits the 40-bit keyspace.
#[inline(always)]
#[must_use]
pub const fn in_bounds(index: u64) -> bool {
    index < KEY_LIMIT
}

/// Extract the radix byte for `level` from a cursor holding the low
/// `40 - 8 * level` bits of the key.
#[inline(always)]
#[must_use]
pub const fn byte_at(cursor: u64, level: u8) -> u8 {
    (cursor >> ((MAX_LEVEL - level) as u32 * ENTRY_BITS)) as u8
}

/// Keep the low `40 - 8 * level` bits of `v`.
///
/// Rewinds the cursor after descending to `level`. For `level == 5` the
/// result is 0.
#[inline(always)]
#[must_use]
pub const fn low_bits(v: u64, level: u8) -> u64 {
    v & ((KEY_LIMIT >> (level as u32 * ENTRY_BITS)) - 1)
}

/// Prefix a node at `level` owns for a key: the high `8 * level` bits.
///
/// For [`LEAF_LEVEL`] this is the full index, which keeps leaf headers
/// uniform with interior headers.
#[inline(always)]
#[must_use]
pub const fn prefix_of(index: u64, level: u8) -> u64 {
    index >> ((KEY_BYTES - level) as u32 * ENTRY_BITS)
}

/// The edge byte a child occupies in a parent at `parent_level`, read back
/// out of the child's own prefix.
///
/// Used to detect a slot that was re-pointed at a different subtree between
/// the key probe and the child load.
#[inline(always)]
#[must_use]
pub const fn prefix_byte(prefix: u64, level: u8, parent_level: u8) -> u8 {
    (prefix >> ((level - parent_level - 1) as u32 * ENTRY_BITS)) as u8
}

/// Outcome of comparing a search cursor against a compressed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixCmp {
    /// Key sorts before every key in the subtree.
    Next,
    /// Key belongs inside the subtree.
    Match,
    /// Key sorts after every key in the subtree.
    Prev,
}

/// Compare the cursor (holding the low bits below `cur_level`) against the
/// prefix of a node at `node_level`.
///
/// Only the `node_level - cur_level` bytes the compressed path skips
/// participate in the comparison.
#[inline]
#[must_use]
pub fn check_prefix(cursor: u64, node_prefix: u64, cur_level: u8, node_level: u8) -> PrefixCmp {
    debug_assert!(cur_level < node_level);

    let cur_prefix: u64 = cursor >> ((KEY_BYTES - node_level) as u32 * ENTRY_BITS);
    let span_bits: u32 = (node_level - cur_level) as u32 * ENTRY_BITS;
    let target_prefix: u64 = node_prefix & ((1_u64 << span_bits) - 1);

    match cur_prefix.cmp(&target_prefix) {
        std::cmp::Ordering::Equal => PrefixCmp::Match,
        std::cmp::Ordering::Greater => PrefixCmp::Prev,
        std::cmp::Ordering::Less => PrefixCmp::Next,
    }
}
