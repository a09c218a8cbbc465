//! Filepath: src/scan.rs
//!
//! Byte-key equality scan for 16-slot nodes.
//!
//! Compares all 16 key bytes against a needle in one step and returns a hit
//! mask (bit `i` set means `keys[i] == needle`).
//!
//! # Architecture Support
//!
//! - **`x86_64`**: SSE2 compare + movemask (always available)
//! - **Other**: scalar loop
//!
//! Callers mask the result with `(1 << count) - 1` themselves; slots past
//! the occupancy count hold stale bytes.

/// Bit mask of positions where `keys[i] == needle`.
#[inline]
#[must_use]
pub fn eq_mask16(keys: &[u8; 16], needle: u8) -> u16 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: SSE2 is part of the x86_64 baseline.
        unsafe { eq_mask16_sse2(keys, needle) }
    }

    #[cfg(not(target_arch = "x86_64"))]
    {
        eq_mask16_scalar(keys, needle)
    }
}

/// Scalar fallback.
#[inline]
#[allow(dead_code)] // Used on non-x86 and in tests
#[must_use]
pub fn eq_mask16_scalar(keys: &[u8; 16], needle: u8) -> u16 {
    let mut mask: u16 = 0;
    for (i, &k) in keys.iter().enumerate() {
        if k == needle {
            mask |= 1 << i;
        }
    }
    mask
}

/// SSE2 compare of all 16 bytes at once.
///
/// # Safety
/// Caller must ensure SSE2 is available (always true on `x86_64`).
#[cfg(target_arch = "x86_64")]
#[inline]
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
unsafe fn eq_mask16_sse2(keys: &[u8; 16], needle: u8) -> u16 {
    use std::arch::x86_64::{_mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi8};

    // SAFETY: `keys` is 16 readable bytes; loadu has no alignment demand.
    unsafe {
        let hay = _mm_loadu_si128(keys.as_ptr().cast());
        let cmp = _mm_cmpeq_epi8(hay, _mm_set1_epi8(needle as i8));
        _mm_movemask_epi8(cmp) as u16
    }
}
