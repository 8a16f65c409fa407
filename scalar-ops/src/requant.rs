//! Requantization: int32 accumulator -> int8 activation.

/// Right-shift applied to every accumulator before saturation.
pub const SCALAR_REQUANT_SHIFT: u32 = 8;

/// `clamp(acc >> shift, -128, 127)` with an arithmetic (sign-extending) shift.
///
/// For negative accumulators this is floor division by `2^shift`, so
/// `-1 >> 8 == -1`, not `0`.
#[inline(never)]
pub fn scalar_requant_i8(acc: i32, shift: u32) -> i8 {
    let mut q = acc >> shift;
    if q > 127 {
        q = 127;
    }
    if q < -128 {
        q = -128;
    }
    q as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requant_positive_range() {
        assert_eq!(scalar_requant_i8(0, 8), 0);
        assert_eq!(scalar_requant_i8(255, 8), 0);
        assert_eq!(scalar_requant_i8(256, 8), 1);
        assert_eq!(scalar_requant_i8(127 * 256, 8), 127);
        assert_eq!(scalar_requant_i8(128 * 256, 8), 127);
        assert_eq!(scalar_requant_i8(i32::MAX, 8), 127);
    }

    #[test]
    fn test_requant_negative_is_floor() {
        assert_eq!(scalar_requant_i8(-1, 8), -1);
        assert_eq!(scalar_requant_i8(-256, 8), -1);
        assert_eq!(scalar_requant_i8(-257, 8), -2);
        assert_eq!(scalar_requant_i8(-128 * 256, 8), -128);
        assert_eq!(scalar_requant_i8(-128 * 256 - 1, 8), -128);
        assert_eq!(scalar_requant_i8(i32::MIN, 8), -128);
    }
}
