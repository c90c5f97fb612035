//! Type/operation registry.
//!
//! The catalog is built once, validated, and treated as read-only for the
//! life of a run. Semantic functions are selected by [`OpKind`] so adding
//! an operation without semantics fails to compile.

mod ops;
mod types;

pub use ops::*;
pub use types::*;

use crate::error::DifftestError;
use crate::kernels::bitwise::{self, ShiftPolicy};
use crate::kernels::float::{self, FloatOp};
use crate::kernels::{bitfield, integer};

/// Read-only catalog of element types and operations.
#[derive(Debug, Clone)]
pub struct Registry {
    types: Vec<TypeProfile>,
    operations: Vec<OperationProfile>,
    shift_policy: ShiftPolicy,
}

impl Registry {
    /// Build a registry from explicit catalogs.
    ///
    /// # Errors
    ///
    /// Returns [`DifftestError::EmptyRegistry`] when either catalog is
    /// empty and [`DifftestError::InvalidTypeProfile`] when a type's byte
    /// size is not exactly `bits / 8`.
    pub fn new(
        types: Vec<TypeProfile>,
        operations: Vec<OperationProfile>,
        shift_policy: ShiftPolicy,
    ) -> Result<Self, DifftestError> {
        if types.is_empty() {
            return Err(DifftestError::EmptyRegistry("types"));
        }
        if operations.is_empty() {
            return Err(DifftestError::EmptyRegistry("operations"));
        }
        for ty in &types {
            if ty.bits == 0 || ty.bits > 64 || ty.bits % 8 != 0 || ty.bytes * 8 != ty.bits {
                return Err(DifftestError::InvalidTypeProfile {
                    name: ty.name.to_string(),
                    bits: ty.bits,
                    bytes: ty.bytes,
                });
            }
        }
        Ok(Self {
            types,
            operations,
            shift_policy,
        })
    }

    /// The built-in PTX catalog.
    pub fn builtin(shift_policy: ShiftPolicy) -> Self {
        Self {
            types: BUILTIN_TYPES.to_vec(),
            operations: BUILTIN_OPERATIONS.to_vec(),
            shift_policy,
        }
    }

    pub fn types(&self) -> &[TypeProfile] {
        &self.types
    }

    pub fn operations(&self) -> &[OperationProfile] {
        &self.operations
    }

    pub fn shift_policy(&self) -> ShiftPolicy {
        self.shift_policy
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeProfile> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn operation(&self, kind: OpKind) -> Option<&OperationProfile> {
        self.operations.iter().find(|o| o.kind == kind)
    }

    /// Operations belonging to `class`, in catalog order.
    pub fn operations_in(&self, class: OperationClass) -> impl Iterator<Item = &OperationProfile> {
        self.operations.iter().filter(move |o| o.class == class)
    }

    /// Types supported by at least one operation of `class`.
    pub fn types_for(&self, class: OperationClass) -> Vec<TypeProfile> {
        self.types
            .iter()
            .filter(|t| self.operations_in(class).any(|o| o.supports(t)))
            .copied()
            .collect()
    }

    /// Reference semantics of `op` over `ty`.
    ///
    /// # Errors
    ///
    /// Returns [`DifftestError::UnsupportedCombination`] when `op` is not
    /// defined for `ty`'s class or width.
    pub fn semantics_of(&self, op: &OperationProfile, ty: &TypeProfile) -> Result<Semantics, DifftestError> {
        if !op.supports(ty) {
            return Err(DifftestError::UnsupportedCombination {
                operation: op.mnemonic.to_string(),
                ty: ty.name.to_string(),
            });
        }
        Ok(Semantics {
            kind: op.kind,
            arity: op.arity,
            ty: *ty,
            shift_policy: self.shift_policy,
        })
    }

    /// Inverse of [`OperationProfile::opcode`] over this catalog.
    pub fn decode_opcode(&self, opcode: &str) -> Option<(OperationProfile, TypeProfile)> {
        self.operations.iter().find_map(|op| {
            let suffix = opcode.strip_prefix(op.mnemonic)?.strip_prefix('.')?;
            let ty = self.type_named(suffix)?;
            op.supports(ty).then_some((*op, *ty))
        })
    }
}

/// A pure function computing one element of an operation's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Semantics {
    kind: OpKind,
    arity: Arity,
    ty: TypeProfile,
    shift_policy: ShiftPolicy,
}

impl Semantics {
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn ty(&self) -> TypeProfile {
        self.ty
    }

    /// Apply to one element's operands.
    ///
    /// Operand order follows the kernel's buffer order: for `bfi` the field
    /// to insert comes first and the base value second; for shifts the
    /// amount is the second operand.
    ///
    /// # Errors
    ///
    /// Returns [`DifftestError::OperandCount`] if `operands` does not match
    /// the arity, and [`DifftestError::MissingBitField`] when a bit-field
    /// operation is applied without a field.
    pub fn apply(&self, operands: &[u64], field: Option<BitField>) -> Result<u64, DifftestError> {
        let expected = self.arity.operands();
        if operands.len() != expected {
            return Err(DifftestError::OperandCount {
                operation: format!("{:?}", self.kind),
                expected,
                actual: operands.len(),
            });
        }
        let bits = self.ty.bits;
        let signed = self.ty.is_signed();
        let is_float = self.ty.is_float();
        let a = operands[0] & self.ty.mask();
        let b = operands.get(1).map_or(0, |v| v & self.ty.mask());
        let c = operands.get(2).map_or(0, |v| v & self.ty.mask());

        let out = match self.kind {
            OpKind::Add if is_float => float::binary(FloatOp::Add, a, b, bits),
            OpKind::Sub if is_float => float::binary(FloatOp::Sub, a, b, bits),
            OpKind::Min if is_float => float::binary(FloatOp::Min, a, b, bits),
            OpKind::Max if is_float => float::binary(FloatOp::Max, a, b, bits),
            OpKind::Neg if is_float => float::neg(a, bits),
            OpKind::Add => integer::add(a, b, bits),
            OpKind::Sub => integer::sub(a, b, bits),
            OpKind::MulLo => integer::mul_lo(a, b, bits),
            OpKind::Mul => float::binary(FloatOp::Mul, a, b, bits),
            OpKind::Min => integer::min(a, b, bits, signed),
            OpKind::Max => integer::max(a, b, bits, signed),
            OpKind::And => bitwise::and(a, b, bits),
            OpKind::Or => bitwise::or(a, b, bits),
            OpKind::Xor => bitwise::xor(a, b, bits),
            OpKind::Neg => integer::neg(a, bits),
            OpKind::Not => bitwise::not(a, bits),
            OpKind::Brev => bitwise::brev(a, bits),
            OpKind::Mad => integer::mad_lo(a, b, c, bits),
            OpKind::Fma => float::fma(a, b, c, bits),
            // shift amounts are u32 whatever the value width
            OpKind::Shl => bitwise::shl(a, operands[1], bits, self.shift_policy),
            OpKind::Shr => bitwise::shr(a, operands[1], bits, signed, self.shift_policy),
            OpKind::Bfe => {
                let f = field.ok_or_else(|| DifftestError::MissingBitField("bfe".to_string()))?;
                bitfield::bfe(a, f.position, f.length, bits, signed)
            }
            OpKind::Bfi => {
                let f = field.ok_or_else(|| DifftestError::MissingBitField("bfi".to_string()))?;
                bitfield::bfi(a, b, f.position, f.length, bits)
            }
        };
        Ok(out)
    }
}
