//! Pointer marking utilities for the root structural lock.
//!
//! Provides provenance-safe pointer marking using the LSB. The root
//! pointer doubles as the lock protecting root replacement: a marked
//! root means a writer is swinging it.

const MARK_BIT: usize = 1;

/// Set mark bit (provenance-safe).
#[inline(always)]
pub fn mark_ptr<T>(p: *mut T) -> *mut T {
    p.map_addr(|a| a | MARK_BIT)
}

/// Clear mark bit (provenance-safe).
#[inline(always)]
pub fn unmark_ptr<T>(p: *mut T) -> *mut T {
    p.map_addr(|a| a & !MARK_BIT)
}

/// Check if marked.
#[inline(always)]
pub fn is_marked<T>(p: *mut T) -> bool {
    p.addr() & MARK_BIT != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_roundtrip() {
        let boxed = Box::new(7_u64);
        let p = Box::into_raw(boxed);

        assert!(!is_marked(p));

        let m = mark_ptr(p);
        assert!(is_marked(m));
        assert_eq!(unmark_ptr(m), p);

        // SAFETY: p came from Box::into_raw above and was never freed.
        unsafe { drop(Box::from_raw(p)) };
    }

    #[test]
    fn test_null_unmarked() {
        let p: *mut u32 = std::ptr::null_mut();
        assert!(!is_marked(p));
        assert!(is_marked(mark_ptr(p)));
        assert!(unmark_ptr(mark_ptr(p)).is_null());
    }
}
