//! Bit-field extract (`bfe`) and insert (`bfi`).
//!
//! Position and length are taken from the low 8 bits of their operands, as
//! the hardware does. Fields reaching past the top of the word are
//! truncated at the most significant bit rather than wrapping.

use super::mask;

/// `bfe.{u,s}N d, a, pos, len`
///
/// Extracts `len` bits of `value` starting at `pos`, right-justified.
/// Unsigned types zero-extend; signed types replicate the field's top bit
/// (bit `min(pos + len - 1, N - 1)` of `value`). `len == 0` yields 0.
pub fn bfe(value: u64, pos: u32, len: u32, bits: u32, signed: bool) -> u64 {
    let pos = pos & 0xFF;
    let len = len & 0xFF;
    if len == 0 {
        return 0;
    }
    let msb = bits - 1;
    let sign_bit = if signed {
        let top = (pos + len - 1).min(msb);
        (value >> top) & 1
    } else {
        0
    };

    let mut out = 0u64;
    for i in 0..bits {
        let bit = if i < len && pos + i <= msb {
            (value >> (pos + i)) & 1
        } else {
            sign_bit
        };
        out |= bit << i;
    }
    out
}

/// `bfi.bN d, f, b, pos, len`
///
/// Returns `base` with bits `[pos, pos + len)` replaced by the low `len`
/// bits of `insert`. Bits outside the field, and field bits past the top of
/// the word, keep their value from `base`.
pub fn bfi(insert: u64, base: u64, pos: u32, len: u32, bits: u32) -> u64 {
    let pos = pos & 0xFF;
    let len = len & 0xFF;
    let base = base & mask(bits);
    if len == 0 || pos >= bits {
        return base;
    }
    let field_len = len.min(bits - pos);
    let field_mask = mask(field_len) << pos;
    (base & !field_mask) | ((insert << pos) & field_mask)
}
