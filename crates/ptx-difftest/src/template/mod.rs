//! Kernel templates: parsing, validation and the loaded store.
//!
//! A template is PTX text with `<NAME>` placeholders plus the operation
//! class it hosts. Templates are loaded and validated once at startup;
//! a template with error-level violations aborts loading.

pub mod parser;
pub mod types;
pub mod validator;

use std::path::Path;

use tracing::{debug, warn};

pub use types::{Template, TemplateEntry, TemplateManifest};

use crate::error::{DifftestError, Severity};

const BUNDLED_MANIFEST: &str = include_str!("../../templates/manifest.yaml");

const BUNDLED_FILES: &[(&str, &str)] = &[
    ("arith.ptx", include_str!("../../templates/arith.ptx")),
    ("unary.ptx", include_str!("../../templates/unary.ptx")),
    ("ternary.ptx", include_str!("../../templates/ternary.ptx")),
    ("shift.ptx", include_str!("../../templates/shift.ptx")),
    ("bfe.ptx", include_str!("../../templates/bfe.ptx")),
    ("bfi.ptx", include_str!("../../templates/bfi.ptx")),
];

/// Validated, read-only set of templates in manifest order.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: Vec<Template>,
}

impl TemplateStore {
    /// Validate `templates` and build a store.
    ///
    /// Warnings are logged; they do not stop loading.
    ///
    /// # Errors
    ///
    /// Returns [`DifftestError::DuplicateTemplate`] when two templates share
    /// an id and [`DifftestError::MalformedTemplate`] for the first
    /// template with an error-level violation.
    pub fn new(templates: Vec<Template>) -> Result<Self, DifftestError> {
        let mut seen = std::collections::HashSet::new();
        for t in &templates {
            if !seen.insert(t.id.as_str()) {
                return Err(DifftestError::DuplicateTemplate(t.id.clone()));
            }
            for v in validator::validate_template(t) {
                match v.severity {
                    Severity::Error => {
                        return Err(DifftestError::MalformedTemplate {
                            id: t.id.clone(),
                            reason: v.to_string(),
                        });
                    }
                    Severity::Warning => warn!(template = %t.id, rule = %v.rule, "{}", v.message),
                    Severity::Info => debug!(template = %t.id, rule = %v.rule, "{}", v.message),
                }
            }
        }
        Ok(Self { templates })
    }

    /// Templates shipped with the crate.
    ///
    /// # Errors
    ///
    /// Only fails if the bundled set itself is broken.
    pub fn builtin() -> Result<Self, DifftestError> {
        let manifest = parser::parse_manifest_str(BUNDLED_MANIFEST)?;
        let templates = manifest
            .templates
            .iter()
            .map(|entry| {
                let text = BUNDLED_FILES
                    .iter()
                    .find(|(file, _)| *file == entry.file)
                    .map(|(_, text)| *text)
                    .ok_or_else(|| DifftestError::MalformedTemplate {
                        id: entry.id.clone(),
                        reason: format!("no bundled file {}", entry.file),
                    })?;
                Ok(Template::new(&entry.id, &entry.entry, entry.class, text))
            })
            .collect::<Result<Vec<_>, DifftestError>>()?;
        Self::new(templates)
    }

    /// Load and validate the templates listed in a manifest file.
    ///
    /// # Errors
    ///
    /// I/O and YAML errors, plus everything [`TemplateStore::new`] rejects.
    pub fn load(manifest: &Path) -> Result<Self, DifftestError> {
        Self::new(parser::load_templates(manifest)?)
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
