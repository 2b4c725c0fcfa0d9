//! Conversions between octal-looking permission values and decimal modes.
//!
//! gNOI carries file permissions as a decimal number whose digits read as
//! octal (`644` on the wire means mode `0o644`). These helpers convert
//! between that form and the real mode bits.

use crate::error::{ApiError, Result};

/// Renders a mode (`0o755` == 493) as its octal digits read in decimal (755).
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] if the result does not fit in `u32`.
pub fn decimal_to_octal(mode: u32) -> Result<u32> {
    let mut rest = mode;
    let mut out: u32 = 0;
    let mut scale: u32 = 1;
    while rest > 0 {
        out = (rest % 8)
            .checked_mul(scale)
            .and_then(|d| out.checked_add(d))
            .ok_or_else(|| ApiError::invalid_value("permissions", mode.to_string()))?;
        rest /= 8;
        if rest > 0 {
            scale = scale
                .checked_mul(10)
                .ok_or_else(|| ApiError::invalid_value("permissions", mode.to_string()))?;
        }
    }
    Ok(out)
}

/// Reads the decimal digits of `digits` as octal (755 becomes `0o755` == 493).
///
/// # Errors
///
/// Returns [`ApiError::InvalidValue`] when a digit is 8 or 9, or on overflow.
pub fn octal_to_decimal(digits: u32) -> Result<u32> {
    let mut rest = digits;
    let mut out: u32 = 0;
    let mut scale: u32 = 1;
    while rest > 0 {
        let digit = rest % 10;
        if digit >= 8 {
            return Err(ApiError::invalid_value("permissions", digits.to_string()));
        }
        out = digit
            .checked_mul(scale)
            .and_then(|d| out.checked_add(d))
            .ok_or_else(|| ApiError::invalid_value("permissions", digits.to_string()))?;
        rest /= 10;
        if rest > 0 {
            scale = scale
                .checked_mul(8)
                .ok_or_else(|| ApiError::invalid_value("permissions", digits.to_string()))?;
        }
    }
    Ok(out)
}
