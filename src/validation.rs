//! Shape and buffer validation for convolution invocations.
//!
//! # Design
//!
//! - All functions return `Result<T, String>`; callers map into `ConvError`
//! - Overflow checks use `checked_mul`
//! - Limits defined once as consts

/// Largest magnitude of one int8 x int8 product (`-128 * -128`).
pub const MAX_PRODUCT_MAGNITUDE: i64 = 128 * 128;

/// Validate spatial extents for a valid (unpadded) convolution.
#[inline]
pub fn validate_conv_dims(height: usize, width: usize, kernel: usize) -> Result<(), String> {
    if height == 0 || width == 0 || kernel == 0 {
        return Err("Dimensions must be > 0".into());
    }
    if kernel > height || kernel > width {
        return Err(format!(
            "kernel {} does not fit a {}x{} input",
            kernel, height, width
        ));
    }
    Ok(())
}

/// Validate that `tile` evenly divides a channel extent of `total`.
#[inline]
pub fn validate_tile(total: usize, tile: usize, name: &str) -> Result<(), String> {
    if total == 0 || tile == 0 {
        return Err(format!("{} and its tile must be > 0", name));
    }
    if total % tile != 0 {
        return Err(format!(
            "{} {} must be a multiple of its tile size {}",
            name, total, tile
        ));
    }
    Ok(())
}

/// Validate that the products of one output pixel cannot overflow int32.
///
/// The bias is excluded: it is added with wrapping arithmetic on both the
/// engine and the reference side.
#[inline]
pub fn validate_accumulator_headroom(in_channels: usize, kernel: usize) -> Result<(), String> {
    let terms = compute_tensor_len(&[in_channels, kernel, kernel], "accumulator terms")?;
    let worst = (terms as i64)
        .checked_mul(MAX_PRODUCT_MAGNITUDE)
        .ok_or_else(|| "accumulator bound overflow".to_string())?;
    if worst > i32::MAX as i64 {
        return Err(format!(
            "{} int8 products per pixel can exceed the int32 accumulator",
            terms
        ));
    }
    Ok(())
}

/// Validate input buffer length matches expected.
#[inline]
pub fn validate_input_len(actual: usize, expected: usize, name: &str) -> Result<(), String> {
    if actual != expected {
        return Err(format!("{} len {} != expected {}", name, actual, expected));
    }
    Ok(())
}

/// Product of `dims` with overflow check.
#[inline]
pub fn compute_tensor_len(dims: &[usize], name: &str) -> Result<usize, String> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| format!("{} length overflow", name))
}
