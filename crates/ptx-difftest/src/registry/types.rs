use serde::{Deserialize, Serialize};

use crate::kernels::{float, mask};

/// Numeric class of an element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeClass {
    Unsigned,
    Signed,
    /// Untyped bit container (`.bN`).
    Bits,
    Float,
}

impl std::fmt::Display for TypeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unsigned => "unsigned",
            Self::Signed => "signed",
            Self::Bits => "bits",
            Self::Float => "float",
        };
        write!(f, "{s}")
    }
}

/// An element type of a kernel buffer.
///
/// `bytes` must equal `bits / 8` exactly; [`crate::registry::Registry::new`]
/// rejects profiles that break this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TypeProfile {
    pub name: &'static str,
    pub bits: u32,
    pub bytes: u32,
    pub class: TypeClass,
}

impl TypeProfile {
    pub const fn new(name: &'static str, bits: u32, class: TypeClass) -> Self {
        Self {
            name,
            bits,
            bytes: bits / 8,
            class,
        }
    }

    pub fn is_float(&self) -> bool {
        self.class == TypeClass::Float
    }

    pub fn is_signed(&self) -> bool {
        self.class == TypeClass::Signed
    }

    /// Mask of the significant bits of an element.
    pub fn mask(&self) -> u64 {
        mask(self.bits)
    }

    /// Name of the same-width untyped container, e.g. `b32` for `f32`.
    pub fn bit_name(&self) -> String {
        format!("b{}", self.bits)
    }

    /// Deterministic edge-case values, as raw bit patterns.
    ///
    /// Integers: zero, one, all-ones, and the signed extremes (which are
    /// also the unsigned mid-points). Floats: signed zeros and ones, the
    /// smallest subnormal, the largest finite values, infinities and NaN.
    pub fn edge_values(&self) -> Vec<u64> {
        let m = self.mask();
        let msb = 1u64 << (self.bits - 1);
        match self.class {
            TypeClass::Unsigned | TypeClass::Signed => vec![0, 1, m, msb, msb - 1],
            TypeClass::Bits => vec![
                0,
                1,
                m,
                msb,
                0x5555_5555_5555_5555 & m,
                0xAAAA_AAAA_AAAA_AAAA & m,
            ],
            TypeClass::Float => float_edges(self.bits),
        }
    }

    /// Render a raw element for diagnostics.
    pub fn format_value(&self, value: u64) -> String {
        let digits = (self.bits / 4) as usize;
        match self.class {
            TypeClass::Float => format!(
                "{} ({value:#0width$x})",
                float::display(value, self.bits),
                width = digits + 2
            ),
            TypeClass::Signed => format!(
                "{} ({value:#0width$x})",
                crate::kernels::sign_extend(value, self.bits),
                width = digits + 2
            ),
            TypeClass::Unsigned | TypeClass::Bits => format!("{value:#0width$x}", width = digits + 2),
        }
    }
}

impl std::fmt::Display for TypeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn float_edges(bits: u32) -> Vec<u64> {
    // (+0, -0, +1, -1, min subnormal, max finite, -max finite, +inf, -inf, qNaN)
    match bits {
        16 => vec![0x0000, 0x8000, 0x3C00, 0xBC00, 0x0001, 0x7BFF, 0xFBFF, 0x7C00, 0xFC00, 0x7E00],
        32 => vec![
            0x0000_0000, 0x8000_0000, 0x3F80_0000, 0xBF80_0000, 0x0000_0001,
            0x7F7F_FFFF, 0xFF7F_FFFF, 0x7F80_0000, 0xFF80_0000, 0x7FC0_0000,
        ],
        _ => vec![
            0, 0x8000_0000_0000_0000, 0x3FF0_0000_0000_0000, 0xBFF0_0000_0000_0000, 1,
            0x7FEF_FFFF_FFFF_FFFF, 0xFFEF_FFFF_FFFF_FFFF, 0x7FF0_0000_0000_0000,
            0xFFF0_0000_0000_0000, 0x7FF8_0000_0000_0000,
        ],
    }
}

pub const U16: TypeProfile = TypeProfile::new("u16", 16, TypeClass::Unsigned);
pub const S16: TypeProfile = TypeProfile::new("s16", 16, TypeClass::Signed);
pub const B16: TypeProfile = TypeProfile::new("b16", 16, TypeClass::Bits);
pub const U32: TypeProfile = TypeProfile::new("u32", 32, TypeClass::Unsigned);
pub const S32: TypeProfile = TypeProfile::new("s32", 32, TypeClass::Signed);
pub const B32: TypeProfile = TypeProfile::new("b32", 32, TypeClass::Bits);
pub const U64: TypeProfile = TypeProfile::new("u64", 64, TypeClass::Unsigned);
pub const S64: TypeProfile = TypeProfile::new("s64", 64, TypeClass::Signed);
pub const B64: TypeProfile = TypeProfile::new("b64", 64, TypeClass::Bits);
pub const F16: TypeProfile = TypeProfile::new("f16", 16, TypeClass::Float);
pub const F32: TypeProfile = TypeProfile::new("f32", 32, TypeClass::Float);
pub const F64: TypeProfile = TypeProfile::new("f64", 64, TypeClass::Float);

/// Every element type the built-in registry knows about.
pub const BUILTIN_TYPES: [TypeProfile; 12] = [U16, S16, B16, U32, S32, B32, U64, S64, B64, F16, F32, F64];
