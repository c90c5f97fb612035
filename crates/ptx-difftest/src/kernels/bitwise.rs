//! Logical operations, bit reversal and shifts.
//!
//! Shift amounts are full 32-bit values. How amounts at or beyond the
//! operand width behave is a property of the target, selected through
//! [`ShiftPolicy`].

use serde::{Deserialize, Serialize};

use super::{mask, sign_extend, truncate};

/// Treatment of shift amounts `>= bits`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftPolicy {
    /// Amounts are clamped to the operand width: `shl`/`shr.u` yield 0,
    /// `shr.s` fills with the sign bit. This is the documented PTX rule.
    #[default]
    Clamp,
    /// Amounts are reduced modulo the operand width before shifting.
    Mask,
}

impl ShiftPolicy {
    /// Effective shift amount, or `None` when the result saturates.
    pub fn effective(self, amount: u64, bits: u32) -> Option<u32> {
        let amount = truncate(amount, 32);
        match self {
            Self::Clamp => {
                if amount >= u64::from(bits) {
                    None
                } else {
                    Some(amount as u32)
                }
            }
            Self::Mask => Some((amount & u64::from(bits - 1)) as u32),
        }
    }
}

impl std::fmt::Display for ShiftPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clamp => write!(f, "clamp"),
            Self::Mask => write!(f, "mask"),
        }
    }
}

impl std::str::FromStr for ShiftPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clamp" => Ok(Self::Clamp),
            "mask" => Ok(Self::Mask),
            other => Err(format!("unknown shift policy '{other}' (expected clamp or mask)")),
        }
    }
}

pub fn and(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a & b, bits)
}

pub fn or(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a | b, bits)
}

pub fn xor(a: u64, b: u64, bits: u32) -> u64 {
    truncate(a ^ b, bits)
}

pub fn not(a: u64, bits: u32) -> u64 {
    truncate(!a, bits)
}

/// `brev.bN`: bit `i` of the result is bit `N - 1 - i` of `value`.
pub fn brev(value: u64, bits: u32) -> u64 {
    truncate(value, bits).reverse_bits() >> (64 - bits)
}

/// `shl.bN`
pub fn shl(value: u64, amount: u64, bits: u32, policy: ShiftPolicy) -> u64 {
    match policy.effective(amount, bits) {
        Some(n) => truncate(value << n, bits),
        None => 0,
    }
}

/// `shr.uN` / `shr.bN` (logical) and `shr.sN` (arithmetic).
pub fn shr(value: u64, amount: u64, bits: u32, signed: bool, policy: ShiftPolicy) -> u64 {
    let n = policy.effective(amount, bits);
    if signed {
        let v = sign_extend(value, bits);
        let shifted = match n {
            Some(n) => v >> n,
            None => v >> (bits - 1),
        };
        truncate(shifted as u64, bits)
    } else {
        match n {
            Some(n) => (value & mask(bits)) >> n,
            None => 0,
        }
    }
}
