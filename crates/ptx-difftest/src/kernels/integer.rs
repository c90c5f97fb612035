//! Integer arithmetic on `u16`/`s16`/`u32`/`s32`/`u64`/`s64` bit patterns.
//!
//! Every result wraps modulo `2^bits`. Signedness only matters for the
//! comparisons in `min`/`max`; the low half of a product is identical for
//! signed and unsigned operands.

use super::{sign_extend, truncate};

/// `add`: `(a + b) mod 2^bits`
pub fn add(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a.wrapping_add(b), bits)
}

/// `sub`: `(a - b) mod 2^bits`
pub fn sub(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a.wrapping_sub(b), bits)
}

/// `mul.lo`: low `bits` bits of the full product.
pub fn mul_lo(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a.wrapping_mul(b), bits)
}

/// `mad.lo`: low `bits` bits of `a * b + c`.
pub fn mad_lo(a: u64, b: u64, c: u64, bits: u32) -> u64 {
    truncate(a.wrapping_mul(b).wrapping_add(c), bits)
}

/// `neg`: two's complement negation.
pub fn neg(a: u64, bits: u32) -> u64 {
    truncate(0u64.wrapping_sub(a), bits)
}

/// `min` under signed or unsigned ordering.
pub fn min(a: u64, b: u64, bits: u32, signed: bool) -> u64 {
    if less_than(b, a, bits, signed) {
        truncate(b, bits)
    } else {
        truncate(a, bits)
    }
}

/// `max` under signed or unsigned ordering.
pub fn max(a: u64, b: u64, bits: u32, signed: bool) -> u64 {
    if less_than(a, b, bits, signed) {
        truncate(b, bits)
    } else {
        truncate(a, bits)
    }
}

fn less_than(a: u64, b: u64, bits: u32, signed: bool) -> bool {
    if signed {
        sign_extend(a, bits) < sign_extend(b, bits)
    } else {
        truncate(a, bits) < truncate(b, bits)
    }
}
