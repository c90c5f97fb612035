//! Test matrix: every (operation, type, bit-field) point a template hosts.
//!
//! Point metadata is enumerated up front in a fixed order; input buffers
//! are only built when a point is pulled from [`MatrixBuilder::points`].
//! Each point's random inputs come from its own seed, derived from the run
//! seed and the point name, so a point reproduces identically whatever
//! else is selected alongside it.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::buffer::{Buffer, BufferSpec};
use crate::error::DifftestError;
use crate::registry::{BitField, OperationClass, OperationProfile, Registry, TypeProfile, U32};
use crate::template::Template;

pub const INPUT_NAMES: [&str; 3] = ["input_a", "input_b", "input_c"];
pub const OUTPUT_NAME: &str = "output";

/// Knobs controlling how many points and elements a matrix holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixOptions {
    pub seed: u64,
    /// Random elements appended after the edge-value cross product.
    pub random_samples: usize,
    /// Include zero-length bit fields.
    pub zero_length_bit_fields: bool,
}

impl Default for MatrixOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            random_samples: 64,
            zero_length_bit_fields: true,
        }
    }
}

/// Restricts which points a run covers. Empty lists select everything.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub templates: Vec<String>,
    pub types: Vec<String>,
    /// Operation mnemonics, e.g. `mul.lo` or `bfe`.
    pub operations: Vec<String>,
    /// Matched against the full point name.
    pub filter: Option<Regex>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// [`DifftestError::Filter`] if `pattern` is not a valid regex.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self, DifftestError> {
        self.filter = Some(Regex::new(pattern)?);
        Ok(self)
    }

    pub fn includes_template(&self, id: &str) -> bool {
        self.templates.is_empty() || self.templates.iter().any(|t| t == id)
    }

    fn includes(&self, op: &OperationProfile, ty: &TypeProfile, name: &str) -> bool {
        (self.types.is_empty() || self.types.iter().any(|t| t == ty.name))
            && (self.operations.is_empty() || self.operations.iter().any(|o| o == op.mnemonic))
            && self.filter.as_ref().is_none_or(|re| re.is_match(name))
    }
}

/// One concrete instantiation of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixPoint {
    /// Position in the template's unfiltered enumeration order.
    pub index: usize,
    pub name: String,
    pub template_id: String,
    pub op: OperationProfile,
    pub ty: TypeProfile,
    pub bit_field: Option<BitField>,
    pub seed: u64,
    pub inputs: Vec<Buffer>,
}

impl MatrixPoint {
    pub fn opcode(&self) -> String {
        self.op.opcode(&self.ty)
    }

    /// Elements per buffer.
    pub fn len(&self) -> usize {
        self.inputs.first().map_or(0, Buffer::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn output_spec(&self) -> BufferSpec {
        BufferSpec {
            name: OUTPUT_NAME.to_string(),
            ty: self.ty,
            len: self.len(),
        }
    }

    /// Operands of element `i`, in buffer order.
    pub fn operands_at(&self, i: usize) -> Vec<u64> {
        self.inputs.iter().map(|b| b.data[i]).collect()
    }
}

/// `<template>/<opcode>` plus `/p<pos>_l<len>` for bit-field points.
pub fn point_name(template_id: &str, op: &OperationProfile, ty: &TypeProfile, field: Option<BitField>) -> String {
    match field {
        Some(f) => format!("{template_id}/{}/{f}", op.opcode(ty)),
        None => format!("{template_id}/{}", op.opcode(ty)),
    }
}

/// FNV-1a over the point name, offset by the run seed.
pub fn point_seed(run_seed: u64, name: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64 ^ run_seed;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Bit-field (position, length) pairs exercised for a `bits`-wide type.
///
/// Covers position 0, fields ending at the top bit, the full-width field,
/// and optionally zero-length fields. Every pair satisfies
/// `position + length <= bits`. Sorted and free of duplicates.
pub fn bit_field_pairs(bits: u32, zero_length: bool) -> Vec<BitField> {
    let positions = [0, 1, 3, bits / 2, bits - 1];
    let mut lengths = vec![1, 4, 8, bits / 2, bits - 1, bits];
    if zero_length {
        lengths.push(0);
    }
    let mut pairs = BTreeSet::new();
    for &len in &lengths {
        for &pos in &positions {
            let field = BitField::new(pos, len);
            if field.fits(bits) {
                pairs.insert(field);
            }
        }
        pairs.insert(BitField::new(bits - len, len));
    }
    pairs.into_iter().collect()
}

/// Edge values for a `u32` shift amount against a `bits`-wide value.
pub fn shift_amount_edges(bits: u32) -> Vec<u64> {
    let w = u64::from(bits);
    let set: BTreeSet<u64> = [0, 1, w - 1, w, w + 1, 255, u64::from(u32::MAX)].into_iter().collect();
    set.into_iter().collect()
}

#[derive(Debug, Clone, Copy)]
struct Axis {
    index: usize,
    op: OperationProfile,
    ty: TypeProfile,
    field: Option<BitField>,
}

/// Enumerates the matrix of one template.
#[derive(Debug, Clone)]
pub struct MatrixBuilder<'a> {
    registry: &'a Registry,
    template: &'a Template,
    options: MatrixOptions,
    selection: Selection,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(registry: &'a Registry, template: &'a Template, options: MatrixOptions) -> Self {
        Self {
            registry,
            template,
            options,
            selection: Selection::all(),
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    /// Number of selected points.
    pub fn len(&self) -> usize {
        self.axes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Selected point names, in matrix order.
    pub fn names(&self) -> Vec<String> {
        self.axes().iter().map(|a| self.name_of(a)).collect()
    }

    /// Selected points in matrix order. Calling again restarts the
    /// enumeration and yields identical points.
    pub fn points(&self) -> impl Iterator<Item = MatrixPoint> + Send + '_ {
        self.axes().into_iter().map(move |axis| self.materialize(axis))
    }

    fn name_of(&self, axis: &Axis) -> String {
        point_name(&self.template.id, &axis.op, &axis.ty, axis.field)
    }

    fn axes(&self) -> Vec<Axis> {
        if !self.selection.includes_template(&self.template.id) {
            return Vec::new();
        }
        let class = self.template.class;
        let mut axes = Vec::new();
        let mut index = 0;
        for op in self.registry.operations_in(class) {
            for ty in self.registry.types().iter().filter(|t| op.supports(t)) {
                let fields: Vec<Option<BitField>> = if class.has_bit_field() {
                    bit_field_pairs(ty.bits, self.options.zero_length_bit_fields)
                        .into_iter()
                        .map(Some)
                        .collect()
                } else {
                    vec![None]
                };
                for field in fields {
                    axes.push(Axis {
                        index,
                        op: *op,
                        ty: *ty,
                        field,
                    });
                    index += 1;
                }
            }
        }
        axes.retain(|a| self.selection.includes(&a.op, &a.ty, &self.name_of(a)));
        axes
    }

    fn materialize(&self, axis: Axis) -> MatrixPoint {
        let name = self.name_of(&axis);
        let seed = point_seed(self.options.seed, &name);
        let inputs = self.generate_inputs(&axis, seed);
        MatrixPoint {
            index: axis.index,
            name,
            template_id: self.template.id.clone(),
            op: axis.op,
            ty: axis.ty,
            bit_field: axis.field,
            seed,
            inputs,
        }
    }

    fn generate_inputs(&self, axis: &Axis, seed: u64) -> Vec<Buffer> {
        let operand_types = operand_types(&axis.op, &axis.ty);
        let edges: Vec<Vec<u64>> = operand_types
            .iter()
            .enumerate()
            .map(|(i, t)| {
                if is_shift_amount(&axis.op, i) {
                    shift_amount_edges(axis.ty.bits)
                } else {
                    t.edge_values()
                }
            })
            .collect();

        let mut columns: Vec<Vec<u64>> = vec![Vec::new(); operand_types.len()];
        for row in cross_product(&edges) {
            for (col, v) in columns.iter_mut().zip(row) {
                col.push(v);
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        for _ in 0..self.options.random_samples {
            for (i, col) in columns.iter_mut().enumerate() {
                let v = if is_shift_amount(&axis.op, i) {
                    random_shift_amount(&mut rng, axis.ty.bits)
                } else {
                    rng.r#gen::<u64>() & operand_types[i].mask()
                };
                col.push(v);
            }
        }

        operand_types
            .into_iter()
            .zip(columns)
            .zip(INPUT_NAMES)
            .map(|((ty, data), name)| Buffer::new(name, ty, data))
            .collect()
    }
}

/// Element type of each operand buffer.
pub fn operand_types(op: &OperationProfile, ty: &TypeProfile) -> Vec<TypeProfile> {
    (0..op.operand_count())
        .map(|i| if is_shift_amount(op, i) { U32 } else { *ty })
        .collect()
}

fn is_shift_amount(op: &OperationProfile, operand: usize) -> bool {
    op.class == OperationClass::Shift && operand == 1
}

fn random_shift_amount(rng: &mut ChaCha8Rng, bits: u32) -> u64 {
    // Mostly in-range amounts, with some arbitrary u32 values.
    if rng.gen_bool(0.75) {
        rng.gen_range(0..=u64::from(2 * bits))
    } else {
        u64::from(rng.r#gen::<u32>())
    }
}

fn cross_product(sets: &[Vec<u64>]) -> Vec<Vec<u64>> {
    let mut rows: Vec<Vec<u64>> = vec![Vec::new()];
    for set in sets {
        rows = rows
            .iter()
            .flat_map(|row| {
                set.iter().map(move |&v| {
                    let mut next = row.clone();
                    next.push(v);
                    next
                })
            })
            .collect();
    }
    rows
}
