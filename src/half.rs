//! Half-precision weight codec.
//!
//! Weights are stored as IEEE 754 binary16 codes (1 sign bit, 5 exponent
//! bits, 10 mantissa bits), halving resident memory versus `f32` storage.
//!
//! # Key Insight: Quantization Tolerance
//!
//! Online gradient-style updates absorb quantization noise: ~3 significant
//! decimal digits is plenty for model weights, while the saved memory
//! doubles the number of feature dimensions that fit in RAM.
//!
//! Two codes get special treatment:
//! - [`ZERO`] round-trips to exactly `0.0`, so the overwhelmingly common
//!   "never written" slot is free of subnormal drift.
//! - [`ONE`] is the fill code for untouched covariance slots.
//!
//! Magnitudes at or above [`MAX_FLOAT`] are rejected at encode time rather
//! than clamped: a clamped weight would silently corrupt the model.

use crate::error::{ModelError, Result};

/// Code for 0.0.
pub const ZERO: u16 = 0x0000;

/// Code for 1.0.
pub const ONE: u16 = 0x3c00;

/// Largest finite magnitude representable in half precision.
pub const MAX_FLOAT: f32 = 65504.0;

/// Encode an `f32` as a half-precision code.
///
/// Fails with [`ModelError::MagnitudeOverflow`] when
/// `value.abs() >= MAX_FLOAT` (infinities included). `0.0` maps to
/// [`ZERO`] exactly; everything else goes through standard f32 → f16
/// conversion with round-to-nearest-even.
///
/// NaN fails no magnitude comparison and passes through as a NaN code.
pub fn encode(value: f32) -> Result<u16> {
    if value.abs() >= MAX_FLOAT {
        return Err(ModelError::MagnitudeOverflow {
            value,
            max: MAX_FLOAT,
        });
    }
    if value == 0.0 {
        return Ok(ZERO);
    }
    Ok(f32_to_f16(value))
}

/// Decode a half-precision code back to `f32`.
///
/// [`ZERO`] decodes to exactly `0.0`.
pub fn decode(code: u16) -> f32 {
    if code == ZERO {
        return 0.0;
    }
    f16_to_f32(code)
}

/// Standard f32 → f16 bit conversion with round-to-nearest-even.
fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        if mantissa != 0 {
            // NaN: the 0x7e00 quiet bit keeps low-mantissa payloads from
            // collapsing into the infinity encoding
            return sign | 0x7e00 | (mantissa >> 13) as u16;
        }
        return sign | 0x7c00;
    }

    // Re-bias from f32 (127) to f16 (15)
    let half_exp = exponent - 127 + 15;

    if half_exp >= 31 {
        // Overflow to infinity
        return sign | 0x7c00;
    }

    if half_exp <= 0 {
        if half_exp < -10 {
            // Below the smallest subnormal, rounds to signed zero
            return sign;
        }
        // Subnormal: restore the hidden bit, shift into place, round
        let mant = mantissa | 0x0080_0000;
        let shift = (14 - half_exp) as u32;
        let mut half = (mant >> shift) as u16;
        let halfway = 1u32 << (shift - 1);
        let rest = mant & ((1 << shift) - 1);
        if rest > halfway || (rest == halfway && half & 1 == 1) {
            half += 1;
        }
        return sign | half;
    }

    // Normal range: truncate 23 -> 10 mantissa bits, round to nearest
    // even. The increment is applied to the packed code so a mantissa
    // carry propagates into the exponent.
    let mut half = ((half_exp as u16) << 10) | ((mantissa >> 13) as u16 & 0x3ff);
    let rest = mantissa & 0x1fff;
    if rest > 0x1000 || (rest == 0x1000 && half & 1 == 1) {
        half += 1;
    }
    sign | half
}

/// Standard f16 → f32 bit expansion.
fn f16_to_f32(code: u16) -> f32 {
    let sign = ((code & 0x8000) as u32) << 16;
    let exponent = ((code >> 10) & 0x1f) as u32;
    let mantissa = (code & 0x3ff) as u32;

    if exponent == 0 {
        if mantissa == 0 {
            return f32::from_bits(sign);
        }
        // Subnormal: renormalize by shifting until the hidden bit appears
        let mut exp = -14i32;
        let mut mant = mantissa;
        while mant & 0x400 == 0 {
            mant <<= 1;
            exp -= 1;
        }
        mant &= 0x3ff;
        return f32::from_bits(sign | (((exp + 127) as u32) << 23) | (mant << 13));
    }

    if exponent == 0x1f {
        if mantissa == 0 {
            return f32::from_bits(sign | 0x7f80_0000);
        }
        return f32::from_bits(sign | 0x7fc0_0000 | (mantissa << 13));
    }

    f32::from_bits(sign | ((exponent + 127 - 15) << 23) | (mantissa << 13))
}
