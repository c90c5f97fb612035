//! Scalar reference semantics for every catalogued operation.
//!
//! All functions work on raw bit patterns carried in a `u64`, with the
//! significant width passed explicitly. Bits above the width are ignored
//! on input and always zero on output, so results compare bit-exactly
//! against device buffers widened to `u64`.
//!
//! - [`integer`] — wrapping add/sub/mul.lo/mad.lo, min/max, neg
//! - [`bitwise`] — and/or/xor/not/brev, shl/shr with a [`bitwise::ShiftPolicy`]
//! - [`bitfield`] — bfe/bfi
//! - [`float`] — IEEE-754 binary16/32/64 add/sub/mul/fma/min/max/neg
//! - [`ulp`] — ULP distance for tolerance-bounded float comparison

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

pub mod bitfield;
pub mod bitwise;
pub mod float;
pub mod integer;
pub mod ulp;

/// All-ones mask covering the low `bits` bits.
#[inline]
pub fn mask(bits: u32) -> u64 {
    debug_assert!((1..=64).contains(&bits));
    u64::MAX >> (64 - bits)
}

/// Interpret the low `bits` bits of `value` as a two's complement integer.
#[inline]
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Truncate a (possibly sign-extended) value back to `bits` bits.
#[inline]
pub fn truncate(value: u64, bits: u32) -> u64 {
    value & mask(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_widths() {
        assert_eq!(mask(16), 0xFFFF);
        assert_eq!(mask(32), 0xFFFF_FFFF);
        assert_eq!(mask(64), u64::MAX);
        assert_eq!(mask(1), 1);
    }

    #[test]
    fn sign_extend_negative() {
        assert_eq!(sign_extend(0x8000, 16), -32768);
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
        assert_eq!(sign_extend(0b1000, 4), -8);
    }

    #[test]
    fn sign_extend_ignores_high_garbage() {
        assert_eq!(sign_extend(0xDEAD_0000_0000_7FFF, 16), 0x7FFF);
    }

    #[test]
    fn truncate_drops_high_bits() {
        assert_eq!(truncate(u64::MAX, 16), 0xFFFF);
        assert_eq!(truncate(-1i64 as u64, 32), 0xFFFF_FFFF);
    }
}
