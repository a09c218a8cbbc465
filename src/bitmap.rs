//! Filepath: src/bitmap.rs
//!
//! 256-bit presence bitmap for the indexed and direct node encodings.
//!
//! One bit per radix byte, LSB-first within each word (`key % 64` is the bit
//! position in word `key / 64`). Writers mutate bits under the node lock;
//! optimistic readers take a [`Bitmap256::snapshot`], which re-reads the four
//! words until two consecutive reads agree, then scan the local copy for the
//! nearest set bit in either direction.

use std::sync::atomic::AtomicU64;

use crate::ordering::{READ_ORD, RELAXED, WRITE_ORD};

/// Number of 64-bit words backing the bitmap.
pub const WORDS: usize = 4;

/// Atomic 256-bit presence bitmap.
#[derive(Debug)]
pub struct Bitmap256 {
    words: [AtomicU64; WORDS],
}

impl Bitmap256 {
    /// An empty bitmap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [const { AtomicU64::new(0) }; WORDS],
        }
    }

    /// Set the bit for `key`. Caller holds the node lock.
    #[inline]
    pub fn set(&self, key: u8) {
        let word = &self.words[usize::from(key) / 64];
        let mask = 1_u64 << (u32::from(key) % 64);
        word.store(word.load(RELAXED) | mask, WRITE_ORD);
    }

    /// Clear the bit for `key`. Caller holds the node lock.
    #[inline]
    pub fn clear(&self, key: u8) {
        let word = &self.words[usize::from(key) / 64];
        let mask = 1_u64 << (u32::from(key) % 64);
        word.store(word.load(RELAXED) & !mask, WRITE_ORD);
    }

    /// Read a consistent copy of all four words.
    ///
    /// Loops until two consecutive reads agree, so a torn view straddling a
    /// concurrent set/clear pair is never returned.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> [u64; WORDS] {
        let mut prev = self.read_words();
        loop {
            let cur = self.read_words();
            if cur == prev {
                return cur;
            }
            prev = cur;
        }
    }

    #[inline]
    fn read_words(&self) -> [u64; WORDS] {
        [
            self.words[0].load(READ_ORD),
            self.words[1].load(READ_ORD),
            self.words[2].load(READ_ORD),
            self.words[3].load(READ_ORD),
        ]
    }
}

impl Default for Bitmap256 {
    fn default() -> Self {
        Self::new()
    }
}

/// Keys `<= from`, highest first, over a snapshot.
#[must_use]
pub fn descending_from(mut snap: [u64; WORDS], from: u8) -> Descending {
    let word = usize::from(from) / 64;
    let pos = u32::from(from) % 64;
    // Drop bits above `from` in its word and everything in higher words.
    if pos < 63 {
        snap[word] &= (1_u64 << (pos + 1)) - 1;
    }
    for w in snap.iter_mut().skip(word + 1) {
        *w = 0;
    }
    Descending { snap }
}

/// Keys `>= from`, lowest first, over a snapshot.
#[must_use]
pub fn ascending_from(mut snap: [u64; WORDS], from: u8) -> Ascending {
    let word = usize::from(from) / 64;
    let pos = u32::from(from) % 64;
    snap[word] &= !((1_u64 << pos) - 1);
    for w in snap.iter_mut().take(word) {
        *w = 0;
    }
    Ascending { snap }
}

/// Iterator over set keys in descending order.
#[derive(Debug)]
pub struct Descending {
    snap: [u64; WORDS],
}

impl Iterator for Descending {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        for (i, word) in self.snap.iter_mut().enumerate().rev() {
            if *word != 0 {
                let bit = 63 - word.leading_zeros();
                *word &= !(1_u64 << bit);
                return Some((i as u32 * 64 + bit) as u8);
            }
        }
        None
    }
}

/// Iterator over set keys in ascending order.
#[derive(Debug)]
pub struct Ascending {
    snap: [u64; WORDS],
}

impl Iterator for Ascending {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        for (i, word) in self.snap.iter_mut().enumerate() {
            if *word != 0 {
                let bit = word.trailing_zeros();
                *word &= !(1_u64 << bit);
                return Some((i as u32 * 64 + bit) as u8);
            }
        }
        None
    }
}
