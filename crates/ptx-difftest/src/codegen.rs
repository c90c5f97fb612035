//! Template expansion.
//!
//! Substitution values are only ever bound through typed helpers. Every
//! element-type placeholder of a buffer (`TYPE`, `BTYPE`, `TYPE_SIZE`,
//! `TYPE_BITS`) is produced from a single [`TypeProfile`] by
//! [`SubstitutionMap::bind_type`], so a kernel's load width and its address
//! stride can never disagree.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::DifftestError;
use crate::matrix::MatrixPoint;
use crate::registry::{BitField, OperationClass, OperationProfile, TypeProfile, U32};
use crate::template::parser::PLACEHOLDER;
use crate::template::Template;

/// Prefix for the shift-amount buffer's type bindings.
pub const SHIFT_PREFIX: &str = "SHIFT_";

/// Generated kernel source, ready for a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    pub entry: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    values: BTreeMap<String, String>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the four element-type placeholders of one buffer family.
    ///
    /// `prefix` is empty for the value type.
    pub fn bind_type(&mut self, prefix: &str, ty: &TypeProfile) -> &mut Self {
        self.values.insert(format!("{prefix}TYPE"), ty.name.to_string());
        self.values.insert(format!("{prefix}BTYPE"), ty.bit_name());
        self.values.insert(format!("{prefix}TYPE_SIZE"), ty.bytes.to_string());
        self.values.insert(format!("{prefix}TYPE_BITS"), ty.bits.to_string());
        self
    }

    pub fn bind_opcode(&mut self, op: &OperationProfile, ty: &TypeProfile) -> &mut Self {
        self.values.insert("OP".to_string(), op.opcode(ty));
        self
    }

    pub fn bind_bit_field(&mut self, field: BitField) -> &mut Self {
        self.values.insert("POS".to_string(), field.position.to_string());
        self.values.insert("LEN".to_string(), field.length.to_string());
        self
    }

    /// Bindings for one matrix point.
    pub fn for_point(point: &MatrixPoint) -> Self {
        let mut map = Self::new();
        map.bind_type("", &point.ty).bind_opcode(&point.op, &point.ty);
        if point.op.class == OperationClass::Shift
            && let Some(amount) = point.inputs.get(1)
        {
            map.bind_type(SHIFT_PREFIX, &amount.ty);
        }
        if let Some(field) = point.bit_field {
            map.bind_bit_field(field);
        }
        map
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Every placeholder name a template of `class` can have bound.
pub fn binding_names(class: OperationClass) -> BTreeSet<String> {
    let mut map = SubstitutionMap::new();
    map.bind_type("", &U32);
    map.values.insert("OP".to_string(), String::new());
    if class == OperationClass::Shift {
        map.bind_type(SHIFT_PREFIX, &U32);
    }
    if class.has_bit_field() {
        map.bind_bit_field(BitField::new(0, 0));
    }
    map.names().map(str::to_string).collect()
}

/// Substitute every placeholder of `template` from `map`.
///
/// # Errors
///
/// Returns [`DifftestError::UnresolvedPlaceholder`] naming the first
/// placeholder, in sorted order, that `map` does not bind.
pub fn expand_with(template: &Template, map: &SubstitutionMap) -> Result<Kernel, DifftestError> {
    if let Some(missing) = template.placeholders.iter().find(|p| map.get(p).is_none()) {
        return Err(DifftestError::UnresolvedPlaceholder {
            template: template.id.clone(),
            placeholder: missing.clone(),
        });
    }
    let source = PLACEHOLDER.replace_all(&template.text, |caps: &regex::Captures<'_>| {
        map.get(&caps[1]).unwrap_or_default().to_string()
    });
    Ok(Kernel {
        entry: template.entry.clone(),
        source: source.into_owned(),
    })
}

/// Expand `template` for one matrix point.
///
/// # Errors
///
/// See [`expand_with`].
pub fn expand(template: &Template, point: &MatrixPoint) -> Result<Kernel, DifftestError> {
    expand_with(template, &SubstitutionMap::for_point(point))
}
