//! Element-wise comparison of device output against the oracle.
//!
//! Integer and bit types must match exactly. Floats match when both are
//! NaN (any payload) or when they lie within the configured ULP distance;
//! with the default tolerance of zero that means bit-exact, so `+0` and
//! `-0` are distinct.

use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::kernels::{float, ulp};
use crate::matrix::MatrixPoint;
use crate::registry::TypeProfile;
use crate::report::{ElementMismatch, Outcome, PointKey, TestResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tolerance {
    pub float_max_ulp: u64,
}

/// Whether `actual` is acceptable for `expected` as an element of `ty`.
pub fn elements_match(expected: u64, actual: u64, ty: &TypeProfile, tolerance: Tolerance) -> bool {
    let (e, a) = (expected & ty.mask(), actual & ty.mask());
    if e == a {
        return true;
    }
    if !ty.is_float() {
        return false;
    }
    let (e_nan, a_nan) = (float::is_nan(e, ty.bits), float::is_nan(a, ty.bits));
    if e_nan || a_nan {
        return e_nan && a_nan;
    }
    tolerance.float_max_ulp > 0 && ulp::ulp_distance_bits(e, a, ty.bits) <= tolerance.float_max_ulp
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparator {
    tolerance: Tolerance,
    max_reported: usize,
}

impl Default for Comparator {
    fn default() -> Self {
        Self::new(Tolerance::default(), 8)
    }
}

impl Comparator {
    pub fn new(tolerance: Tolerance, max_reported: usize) -> Self {
        Self {
            tolerance,
            max_reported,
        }
    }

    /// Compare device output for `point` against the oracle.
    ///
    /// A length difference is reported as the same execution failure a
    /// driver returning a short buffer gets, not as a mismatch.
    pub fn compare(&self, point: &MatrixPoint, expected: Buffer, actual: Buffer) -> TestResult {
        let key = PointKey::from(point);
        if let Err(shape) = expected.spec().check(&actual) {
            return TestResult::execution_failure(point, shape.to_string());
        }

        let ty = point.ty;
        let mut total = 0;
        let mut elements = Vec::new();
        for (i, (&e, &a)) in expected.data.iter().zip(&actual.data).enumerate() {
            if elements_match(e, a, &ty, self.tolerance) {
                continue;
            }
            total += 1;
            if elements.len() < self.max_reported {
                elements.push(ElementMismatch {
                    index: i,
                    inputs: point
                        .inputs
                        .iter()
                        .map(|b| b.ty.format_value(b.data[i]))
                        .collect(),
                    expected: ty.format_value(e),
                    actual: ty.format_value(a),
                    ulp: ulp_if_finite(e, a, &ty),
                });
            }
        }

        let outcome = if total == 0 {
            Outcome::Pass
        } else {
            Outcome::Mismatch { total, elements }
        };
        TestResult {
            point: key,
            elements: expected.len(),
            outcome,
            expected: Some(expected),
            actual: Some(actual),
        }
    }
}

fn ulp_if_finite(e: u64, a: u64, ty: &TypeProfile) -> Option<u64> {
    (ty.is_float() && !float::is_nan(e, ty.bits) && !float::is_nan(a, ty.bits))
        .then(|| ulp::ulp_distance_bits(e, a, ty.bits))
}
