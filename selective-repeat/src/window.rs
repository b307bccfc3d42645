//! Cyclic sequence-number arithmetic.
//!
//! Sequence numbers live in `0..seq_space` and wrap.  A window is the
//! half-open run of `size` consecutive numbers starting at `base`, so when
//! `base + size` passes `seq_space` the window straddles zero:
//!
//! ```text
//!  seq_space = 12, size = 6
//!
//!  base = 2:   . . [2 3 4 5 6 7] . . . .
//!  base = 9:   0 1 2] . . . . . . [9 10 11
//! ```
//!
//! Sender and receiver both go through [`in_window`] and [`offset`] so the
//! wraparound logic exists in exactly one place.

/// `true` when `seq` lies in `[base, base + size - 1]` modulo `seq_space`.
///
/// Values outside `0..seq_space` are never in the window.
#[inline]
pub fn in_window(seq: u32, base: u32, size: usize, seq_space: u32) -> bool {
    if seq >= seq_space {
        return false;
    }
    offset(seq, base, seq_space) < size
}

/// Distance from `base` forward to `seq`, modulo `seq_space`.
///
/// Inside the window this is the buffer slot index for `seq`.
#[inline]
pub fn offset(seq: u32, base: u32, seq_space: u32) -> usize {
    // Adding seq_space first keeps the subtraction non-negative when seq has
    // wrapped past zero and base has not.
    ((u64::from(seq) + u64::from(seq_space) - u64::from(base)) % u64::from(seq_space)) as usize
}

/// `seq + by` modulo `seq_space`.
#[inline]
pub fn advance(seq: u32, by: usize, seq_space: u32) -> u32 {
    ((u64::from(seq) + by as u64) % u64::from(seq_space)) as u32
}
