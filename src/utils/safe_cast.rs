//! Safe casting utilities for pixel coordinates and image dimensions

use crate::{Error, Result};

/// Safely convert usize to u32 with overflow checking
///
/// # Errors
///
/// Returns an error if the value exceeds u32::MAX
pub fn usize_to_u32(value: usize) -> Result<u32> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in u32")))
}

/// Safely convert u32 to usize
///
/// # Errors
///
/// Returns an error if the value does not fit the platform's usize
pub fn u32_to_usize(value: u32) -> Result<usize> {
    value
        .try_into()
        .map_err(|_| Error::InvalidInput(format!("Value {value} too large to fit in usize")))
}

/// Safely convert f64 to i32 with bounds checking
///
/// # Errors
///
/// Returns an error if the value is not finite or outside i32 range
#[allow(clippy::cast_possible_truncation)] // Truncation after bounds check is safe
pub fn f64_to_i32(value: f64) -> Result<i32> {
    if value.is_finite() && value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX) {
        Ok(value as i32)
    } else {
        Err(Error::InvalidInput(format!(
            "Value {value} cannot be safely converted to i32"
        )))
    }
}

/// Round a sub-pixel displacement to the nearest whole pixel
///
/// # Errors
///
/// Returns an error if the rounded value is not representable as i32
pub fn round_to_pixel(value: f64) -> Result<i32> {
    f64_to_i32(value.round())
}
