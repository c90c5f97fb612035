//! Reference oracle: computes the expected output of a matrix point on
//! the host, independent of any device or driver.

use std::collections::BTreeMap;

use crate::buffer::Buffer;
use crate::error::DifftestError;
use crate::matrix::{MatrixPoint, OUTPUT_NAME};
use crate::registry::{BitField, OpKind, OperationProfile, Registry, TypeProfile};

/// Replacement semantics for one operation kind.
///
/// Receives the element type, the operands of one element (already masked
/// to their widths) and the bit field, if any.
pub type SemanticOverride = fn(&TypeProfile, &[u64], Option<BitField>) -> u64;

#[derive(Debug, Clone)]
pub struct Oracle<'a> {
    registry: &'a Registry,
    overrides: BTreeMap<OpKind, SemanticOverride>,
}

impl<'a> Oracle<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the reference semantics of `kind`.
    ///
    /// Used to check that a wrong oracle is actually caught.
    #[must_use]
    pub fn with_override(mut self, kind: OpKind, semantics: SemanticOverride) -> Self {
        self.overrides.insert(kind, semantics);
        self
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Expected value of one element.
    ///
    /// # Errors
    ///
    /// [`DifftestError::UnsupportedCombination`] if `op` is not defined for
    /// `ty`, plus any error from [`crate::registry::Semantics::apply`].
    pub fn evaluate(
        &self,
        op: &OperationProfile,
        ty: &TypeProfile,
        operands: &[u64],
        field: Option<BitField>,
    ) -> Result<u64, DifftestError> {
        let semantics = self.registry.semantics_of(op, ty)?;
        match self.overrides.get(&op.kind) {
            Some(f) => Ok(f(ty, operands, field) & ty.mask()),
            None => semantics.apply(operands, field),
        }
    }

    /// Expected output buffer for every element of `point`.
    ///
    /// # Errors
    ///
    /// See [`Oracle::evaluate`].
    pub fn expected_output(&self, point: &MatrixPoint) -> Result<Buffer, DifftestError> {
        let data = (0..point.len())
            .map(|i| self.evaluate(&point.op, &point.ty, &point.operands_at(i), point.bit_field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Buffer::new(OUTPUT_NAME, point.ty, data))
    }
}
