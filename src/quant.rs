//! Requantization from the int32 accumulator domain to int8 activations.
//!
//! The whole engine uses one policy: an arithmetic right shift by
//! [`REQUANT_SHIFT`] followed by a saturating clamp to `[-128, 127]`.

/// Right-shift applied to every finalized accumulator.
pub const REQUANT_SHIFT: u32 = 8;

/// Smallest accumulator that saturates to `i8::MAX`.
pub const SATURATE_HIGH_THRESHOLD: i32 = (i8::MAX as i32 + 1) << REQUANT_SHIFT;

/// Largest accumulator that saturates to `i8::MIN`.
pub const SATURATE_LOW_THRESHOLD: i32 = ((i8::MIN as i32) << REQUANT_SHIFT) - 1;

/// `clamp(acc >> 8, -128, 127)`.
///
/// `>>` on `i32` sign-extends, so negative accumulators round toward
/// negative infinity.
#[inline(always)]
pub fn requantize(acc: i32) -> i8 {
    (acc >> REQUANT_SHIFT).clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Requantize a bank of accumulators into `out`.
#[inline]
pub fn requantize_into(acc: &[i32], out: &mut [i8]) {
    debug_assert_eq!(acc.len(), out.len());
    for (o, &a) in out.iter_mut().zip(acc) {
        *o = requantize(a);
    }
}
