//! IEEE-754 binary16/32/64 arithmetic on bit patterns.
//!
//! Arithmetic rounds to nearest-even. Binary16 goes through `f32`, whose
//! 24-bit significand is at least `2p + 2` for `p = 11`, so rounding to
//! `f32` and then to half gives the correctly rounded half result.

use half::f16;

/// Binary floating-point operation selected by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Min,
    Max,
}

/// Apply a binary operation to two `bits`-wide float bit patterns.
pub fn binary(op: FloatOp, a: u64, b: u64, bits: u32) -> u64 {
    match bits {
        16 => {
            let (x, y) = (f16_value(a), f16_value(b));
            let r = match op {
                FloatOp::Min => min_f32(x, y),
                FloatOp::Max => max_f32(x, y),
                _ => apply_f32(op, x, y),
            };
            u64::from(f16::from_f32(r).to_bits())
        }
        32 => {
            let (x, y) = (f32::from_bits(a as u32), f32::from_bits(b as u32));
            let r = match op {
                FloatOp::Min => min_f32(x, y),
                FloatOp::Max => max_f32(x, y),
                _ => apply_f32(op, x, y),
            };
            u64::from(r.to_bits())
        }
        64 => {
            let (x, y) = (f64::from_bits(a), f64::from_bits(b));
            let r = match op {
                FloatOp::Add => x + y,
                FloatOp::Sub => x - y,
                FloatOp::Mul => x * y,
                FloatOp::Min => min_f64(x, y),
                FloatOp::Max => max_f64(x, y),
            };
            r.to_bits()
        }
        _ => unreachable!("no binary{bits} float type"),
    }
}

/// `fma.rn`: `a * b + c` with a single rounding.
pub fn fma(a: u64, b: u64, c: u64, bits: u32) -> u64 {
    match bits {
        32 => {
            let r = f32::from_bits(a as u32).mul_add(f32::from_bits(b as u32), f32::from_bits(c as u32));
            u64::from(r.to_bits())
        }
        64 => f64::from_bits(a).mul_add(f64::from_bits(b), f64::from_bits(c)).to_bits(),
        _ => unreachable!("fma is not defined for binary{bits}"),
    }
}

/// `neg`: flips the sign bit, NaN payload included.
pub fn neg(a: u64, bits: u32) -> u64 {
    a ^ (1u64 << (bits - 1))
}

/// True when the bit pattern encodes a NaN of the given width.
pub fn is_nan(a: u64, bits: u32) -> bool {
    match bits {
        16 => f16::from_bits(a as u16).is_nan(),
        32 => f32::from_bits(a as u32).is_nan(),
        64 => f64::from_bits(a).is_nan(),
        _ => false,
    }
}

/// Render a float bit pattern for diagnostics.
pub fn display(a: u64, bits: u32) -> String {
    match bits {
        16 => format!("{}", f16::from_bits(a as u16)),
        32 => format!("{:e}", f32::from_bits(a as u32)),
        64 => format!("{:e}", f64::from_bits(a)),
        _ => format!("{a:#x}"),
    }
}

fn f16_value(a: u64) -> f32 {
    f16::from_bits(a as u16).to_f32()
}

fn apply_f32(op: FloatOp, x: f32, y: f32) -> f32 {
    match op {
        FloatOp::Add => x + y,
        FloatOp::Sub => x - y,
        FloatOp::Mul => x * y,
        FloatOp::Min => min_f32(x, y),
        FloatOp::Max => max_f32(x, y),
    }
}

// NaN loses to a number; -0.0 orders below +0.0.

fn min_f32(x: f32, y: f32) -> f32 {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => f32::NAN,
        (true, false) => y,
        (false, true) => x,
        _ if x == 0.0 && y == 0.0 => if x.is_sign_negative() { x } else { y },
        _ => if y < x { y } else { x },
    }
}

fn max_f32(x: f32, y: f32) -> f32 {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => f32::NAN,
        (true, false) => y,
        (false, true) => x,
        _ if x == 0.0 && y == 0.0 => if x.is_sign_positive() { x } else { y },
        _ => if y > x { y } else { x },
    }
}

fn min_f64(x: f64, y: f64) -> f64 {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => y,
        (false, true) => x,
        _ if x == 0.0 && y == 0.0 => if x.is_sign_negative() { x } else { y },
        _ => if y < x { y } else { x },
    }
}

fn max_f64(x: f64, y: f64) -> f64 {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => f64::NAN,
        (true, false) => y,
        (false, true) => x,
        _ if x == 0.0 && y == 0.0 => if x.is_sign_positive() { x } else { y },
        _ => if y > x { y } else { x },
    }
}
