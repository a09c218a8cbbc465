//! Filepath: src/version.rs
//!
//! Versioned lock word for optimistic lock coupling.
//!
//! Every node header embeds a [`VersionLock`]: a single `u64` combining an
//! obsolete flag, a lock flag, and a generation counter.
//!
//! # Layout
//! Bit 0: `obsolete` | Bit 1: `locked` | Bits 2..: generation
//!
//! # Concurrency Model
//! 1. Readers snapshot the word with [`VersionLock::load`], perform reads,
//!    then confirm the snapshot with [`VersionLock::has_changed`].
//! 2. Writers either spin-acquire with [`VersionLock::write_lock_or_restart`]
//!    or upgrade a reader snapshot with
//!    [`VersionLock::lock_version_or_restart`], which fails if anything
//!    happened since the snapshot.
//!
//! Unlocking adds `0b10`, bumping the generation and clearing the lock flag
//! in one step. [`VersionLock::write_unlock_obsolete`] adds `0b11`, which
//! additionally sets the obsolete flag; a node retired this way sends every
//! in-flight optimistic reader back to the root.
//!
//! All conflict outcomes are restart signals, never errors.

use std::sync::atomic::AtomicU64;

use crate::ordering::{CAS_FAILURE, CAS_SUCCESS, READ_ORD, UNLOCK_ORD};

/// Obsolete flag: the node has been replaced or deleted.
const OBSOLETE_BIT: u64 = 0b01;

/// Lock flag: a writer holds the node.
const LOCK_BIT: u64 = 0b10;

/// Versioned lock embedded in every node header.
#[derive(Debug)]
#[repr(transparent)]
pub struct VersionLock {
    word: AtomicU64,
}

impl VersionLock {
    /// A fresh, unlocked, current version.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            word: AtomicU64::new(0),
        }
    }

    /// Snapshot the version word.
    #[inline]
    #[must_use]
    pub fn load(&self) -> u64 {
        self.word.load(READ_ORD)
    }

    /// Whether a snapshot has the lock flag set.
    #[inline]
    #[must_use]
    pub const fn is_locked(version: u64) -> bool {
        version & LOCK_BIT == LOCK_BIT
    }

    /// Whether a snapshot has the obsolete flag set.
    #[inline]
    #[must_use]
    pub const fn is_obsolete(version: u64) -> bool {
        version & OBSOLETE_BIT == OBSOLETE_BIT
    }

    /// Whether the word moved since `snapshot` was taken.
    ///
    /// A positive answer invalidates everything read under the snapshot.
    #[inline]
    #[must_use]
    pub fn has_changed(&self, snapshot: u64) -> bool {
        self.word.load(READ_ORD) != snapshot
    }

    /// Spin until the lock is free and acquire it.
    ///
    /// # Returns
    /// `true` if the caller must restart (the node went obsolete while
    /// waiting), `false` with the lock held.
    #[inline]
    #[must_use]
    pub fn write_lock_or_restart(&self) -> bool {
        loop {
            let mut version: u64 = self.load();
            while Self::is_locked(version) {
                std::hint::spin_loop();
                version = self.load();
            }
            if Self::is_obsolete(version) {
                return true;
            }
            if self
                .word
                .compare_exchange_weak(version, version + LOCK_BIT, CAS_SUCCESS, CAS_FAILURE)
                .is_ok()
            {
                return false;
            }
        }
    }

    /// Upgrade a reader snapshot to the write lock.
    ///
    /// Succeeds only if the word still equals `*version`; on success the
    /// snapshot is advanced past the lock acquisition so a later
    /// [`Self::has_changed`] against it stays meaningful.
    ///
    /// # Returns
    /// `true` if the caller must restart, `false` with the lock held.
    #[inline]
    #[must_use]
    pub fn lock_version_or_restart(&self, version: &mut u64) -> bool {
        if Self::is_locked(*version) || Self::is_obsolete(*version) {
            return true;
        }
        if self
            .word
            .compare_exchange(*version, *version + LOCK_BIT, CAS_SUCCESS, CAS_FAILURE)
            .is_ok()
        {
            *version += LOCK_BIT;
            false
        } else {
            true
        }
    }

    /// Release the lock, bumping the generation.
    #[inline]
    pub fn write_unlock(&self) {
        self.word.fetch_add(LOCK_BIT, UNLOCK_ORD);
    }

    /// Release the lock and mark the node obsolete in one step.
    ///
    /// Readers holding pre-lock snapshots fail validation; readers that
    /// arrive later see the obsolete flag and restart from the root.
    #[inline]
    pub fn write_unlock_obsolete(&self) {
        self.word.fetch_add(LOCK_BIT | OBSOLETE_BIT, UNLOCK_ORD);
    }
}

impl Default for VersionLock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_version_unlocked() {
        let v = VersionLock::new();
        let snap = v.load();
        assert!(!VersionLock::is_locked(snap));
        assert!(!VersionLock::is_obsolete(snap));
        assert!(!v.has_changed(snap));
    }

    #[test]
    fn test_lock_unlock_bumps_generation() {
        let v = VersionLock::new();
        let before = v.load();

        assert!(!v.write_lock_or_restart());
        assert!(VersionLock::is_locked(v.load()));
        assert!(v.has_changed(before));

        v.write_unlock();
        let after = v.load();
        assert!(!VersionLock::is_locked(after));
        assert_ne!(before, after);
    }

    #[test]
    fn test_snapshot_upgrade() {
        let v = VersionLock::new();
        let mut snap = v.load();
        assert!(!v.lock_version_or_restart(&mut snap));

        // The advanced snapshot matches the locked word.
        assert!(!v.has_changed(snap));
        v.write_unlock();
    }

    #[test]
    fn test_stale_snapshot_upgrade_fails() {
        let v = VersionLock::new();
        let mut stale = v.load();

        assert!(!v.write_lock_or_restart());
        v.write_unlock();

        assert!(v.lock_version_or_restart(&mut stale));
    }

    #[test]
    fn test_obsolete_rejects_lockers() {
        let v = VersionLock::new();
        assert!(!v.write_lock_or_restart());
        v.write_unlock_obsolete();

        assert!(VersionLock::is_obsolete(v.load()));
        assert!(v.write_lock_or_restart());

        let mut snap = v.load();
        assert!(v.lock_version_or_restart(&mut snap));
    }

    #[test]
    fn test_contended_locking() {
        use std::sync::Arc;

        let v = Arc::new(VersionLock::new());
        let counter = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let v = Arc::clone(&v);
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        assert!(!v.write_lock_or_restart());
                        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        v.write_unlock();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::Relaxed), 8_000);
    }
}
