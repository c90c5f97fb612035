//! ULP (Unit in the Last Place) distance utilities for floating-point comparison.
//!
//! Used to verify device outputs fall within an acceptable tolerance of the
//! reference oracle.

use half::f16;

/// Compute the ULP distance between two f32 values.
///
/// Returns the number of representable floats between `a` and `b`.
/// Special cases: if either value is NaN, returns `u32::MAX`.
/// If signs differ and neither is zero, returns `u32::MAX`.
#[must_use]
pub fn ulp_distance(a: f32, b: f32) -> u32 {
    if a.is_nan() || b.is_nan() {
        return u32::MAX;
    }
    if a == b {
        return 0;
    }
    let a_bits = a.to_bits() as i32;
    let b_bits = b.to_bits() as i32;
    // Handle sign mismatch (excluding ±0)
    if (a_bits < 0) != (b_bits < 0) {
        return u32::MAX;
    }
    a_bits.abs_diff(b_bits)
}

/// [`ulp_distance`] for f64.
#[must_use]
pub fn ulp_distance_f64(a: f64, b: f64) -> u64 {
    if a.is_nan() || b.is_nan() {
        return u64::MAX;
    }
    if a == b {
        return 0;
    }
    let a_bits = a.to_bits() as i64;
    let b_bits = b.to_bits() as i64;
    if (a_bits < 0) != (b_bits < 0) {
        return u64::MAX;
    }
    a_bits.abs_diff(b_bits)
}

/// [`ulp_distance`] for binary16.
#[must_use]
pub fn ulp_distance_f16(a: f16, b: f16) -> u32 {
    if a.is_nan() || b.is_nan() {
        return u32::MAX;
    }
    if a == b {
        return 0;
    }
    let a_bits = a.to_bits() as i16;
    let b_bits = b.to_bits() as i16;
    if (a_bits < 0) != (b_bits < 0) {
        return u32::MAX;
    }
    u32::from(a_bits.abs_diff(b_bits))
}

/// ULP distance between two float bit patterns of the given width.
#[must_use]
pub fn ulp_distance_bits(a: u64, b: u64, bits: u32) -> u64 {
    match bits {
        16 => saturate(ulp_distance_f16(f16::from_bits(a as u16), f16::from_bits(b as u16))),
        32 => saturate(ulp_distance(f32::from_bits(a as u32), f32::from_bits(b as u32))),
        64 => ulp_distance_f64(f64::from_bits(a), f64::from_bits(b)),
        _ => u64::MAX,
    }
}

fn saturate(d: u32) -> u64 {
    if d == u32::MAX { u64::MAX } else { u64::from(d) }
}
