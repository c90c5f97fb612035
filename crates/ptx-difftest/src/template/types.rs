use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::registry::OperationClass;

/// Template manifest, as loaded from `manifest.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateManifest {
    pub version: String,
    #[serde(default)]
    pub templates: Vec<TemplateEntry>,
}

/// One manifest entry: where a template lives and what it hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateEntry {
    pub id: String,
    /// Path relative to the manifest's directory.
    pub file: String,
    /// Name of the `.entry` the driver launches.
    pub entry: String,
    pub class: OperationClass,
}

/// A kernel template with its discovered placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: String,
    pub entry: String,
    pub class: OperationClass,
    pub text: String,
    /// Distinct `<NAME>` tokens in the text, sorted.
    pub placeholders: BTreeSet<String>,
}

impl Template {
    /// Build a template, discovering its placeholders.
    pub fn new(
        id: impl Into<String>,
        entry: impl Into<String>,
        class: OperationClass,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        let placeholders = super::parser::placeholders(&text);
        Self {
            id: id.into(),
            entry: entry.into(),
            class,
            text,
            placeholders,
        }
    }

    pub fn references(&self, name: &str) -> bool {
        self.placeholders.contains(name)
    }
}
