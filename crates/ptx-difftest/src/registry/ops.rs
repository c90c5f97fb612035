use serde::{Deserialize, Serialize};

use super::types::{TypeClass, TypeProfile};

/// Closed set of operations with reference semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Add,
    Sub,
    MulLo,
    Mul,
    Min,
    Max,
    And,
    Or,
    Xor,
    Neg,
    Not,
    Brev,
    Mad,
    Fma,
    Shl,
    Shr,
    Bfe,
    Bfi,
}

/// Which template shape an operation plugs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Binary,
    Unary,
    Ternary,
    Shift,
    BitFieldExtract,
    BitFieldInsert,
}

impl OperationClass {
    /// Whether points of this class carry a bit-field position and length.
    pub fn has_bit_field(self) -> bool {
        matches!(self, Self::BitFieldExtract | Self::BitFieldInsert)
    }
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Binary => "binary",
            Self::Unary => "unary",
            Self::Ternary => "ternary",
            Self::Shift => "shift",
            Self::BitFieldExtract => "bit_field_extract",
            Self::BitFieldInsert => "bit_field_insert",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Arity {
    Unary,
    Binary,
    Ternary,
}

impl Arity {
    pub fn operands(self) -> usize {
        match self {
            Self::Unary => 1,
            Self::Binary => 2,
            Self::Ternary => 3,
        }
    }
}

/// Position and length of a bit field, in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BitField {
    pub position: u32,
    pub length: u32,
}

impl BitField {
    pub fn new(position: u32, length: u32) -> Self {
        Self { position, length }
    }

    /// True when the field lies entirely within a `bits`-wide word.
    pub fn fits(&self, bits: u32) -> bool {
        self.position + self.length <= bits
    }
}

impl std::fmt::Display for BitField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "p{}_l{}", self.position, self.length)
    }
}

/// Catalog entry for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OperationProfile {
    pub kind: OpKind,
    /// Opcode stem; the type name is appended (`mul.lo` + `s32`).
    pub mnemonic: &'static str,
    pub arity: Arity,
    pub class: OperationClass,
    pub type_classes: &'static [TypeClass],
    pub widths: &'static [u32],
}

impl OperationProfile {
    /// Whether this operation is defined for `ty`.
    pub fn supports(&self, ty: &TypeProfile) -> bool {
        self.type_classes.contains(&ty.class) && self.widths.contains(&ty.bits)
    }

    /// Concrete opcode for `ty`, e.g. `add.u32` or `fma.rn.f64`.
    pub fn opcode(&self, ty: &TypeProfile) -> String {
        format!("{}.{}", self.mnemonic, ty.name)
    }

    /// Number of operand buffers a kernel for this operation reads.
    pub fn operand_count(&self) -> usize {
        self.arity.operands()
    }
}

impl std::fmt::Display for OperationProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)
    }
}

const INT: &[TypeClass] = &[TypeClass::Unsigned, TypeClass::Signed];
const SIGNED_OR_FLOAT: &[TypeClass] = &[TypeClass::Signed, TypeClass::Float];
const INT_OR_FLOAT: &[TypeClass] = &[TypeClass::Unsigned, TypeClass::Signed, TypeClass::Float];
const FLOAT: &[TypeClass] = &[TypeClass::Float];
const BITS: &[TypeClass] = &[TypeClass::Bits];
const EXTRACT: &[TypeClass] = &[TypeClass::Unsigned, TypeClass::Signed];
const SHR: &[TypeClass] = &[TypeClass::Unsigned, TypeClass::Signed, TypeClass::Bits];

const ALL_WIDTHS: &[u32] = &[16, 32, 64];
const WORD_WIDTHS: &[u32] = &[32, 64];

const fn op(
    kind: OpKind,
    mnemonic: &'static str,
    arity: Arity,
    class: OperationClass,
    type_classes: &'static [TypeClass],
    widths: &'static [u32],
) -> OperationProfile {
    OperationProfile {
        kind,
        mnemonic,
        arity,
        class,
        type_classes,
        widths,
    }
}

/// Every operation the built-in registry knows about.
pub const BUILTIN_OPERATIONS: [OperationProfile; 18] = [
    op(OpKind::Add, "add", Arity::Binary, OperationClass::Binary, INT_OR_FLOAT, ALL_WIDTHS),
    op(OpKind::Sub, "sub", Arity::Binary, OperationClass::Binary, INT_OR_FLOAT, ALL_WIDTHS),
    op(OpKind::MulLo, "mul.lo", Arity::Binary, OperationClass::Binary, INT, ALL_WIDTHS),
    op(OpKind::Mul, "mul.rn", Arity::Binary, OperationClass::Binary, FLOAT, ALL_WIDTHS),
    op(OpKind::Min, "min", Arity::Binary, OperationClass::Binary, INT_OR_FLOAT, ALL_WIDTHS),
    op(OpKind::Max, "max", Arity::Binary, OperationClass::Binary, INT_OR_FLOAT, ALL_WIDTHS),
    op(OpKind::And, "and", Arity::Binary, OperationClass::Binary, BITS, ALL_WIDTHS),
    op(OpKind::Or, "or", Arity::Binary, OperationClass::Binary, BITS, ALL_WIDTHS),
    op(OpKind::Xor, "xor", Arity::Binary, OperationClass::Binary, BITS, ALL_WIDTHS),
    op(OpKind::Neg, "neg", Arity::Unary, OperationClass::Unary, SIGNED_OR_FLOAT, ALL_WIDTHS),
    op(OpKind::Not, "not", Arity::Unary, OperationClass::Unary, BITS, ALL_WIDTHS),
    op(OpKind::Brev, "brev", Arity::Unary, OperationClass::Unary, BITS, WORD_WIDTHS),
    op(OpKind::Mad, "mad.lo", Arity::Ternary, OperationClass::Ternary, INT, ALL_WIDTHS),
    op(OpKind::Fma, "fma.rn", Arity::Ternary, OperationClass::Ternary, FLOAT, WORD_WIDTHS),
    op(OpKind::Shl, "shl", Arity::Binary, OperationClass::Shift, BITS, ALL_WIDTHS),
    op(OpKind::Shr, "shr", Arity::Binary, OperationClass::Shift, SHR, ALL_WIDTHS),
    op(OpKind::Bfe, "bfe", Arity::Unary, OperationClass::BitFieldExtract, EXTRACT, WORD_WIDTHS),
    op(OpKind::Bfi, "bfi", Arity::Binary, OperationClass::BitFieldInsert, BITS, WORD_WIDTHS),
];
