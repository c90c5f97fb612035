use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DifftestError;
use crate::template::types::{Template, TemplateManifest};

/// `<NAME>` with an upper-case identifier. Register ranges such as `%r<4>`
/// never match.
pub(crate) static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Z][A-Z0-9_]*)>").expect("static placeholder pattern"));

/// Distinct placeholder names referenced by `text`.
pub fn placeholders(text: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Parse a template manifest file.
///
/// # Errors
///
/// Returns [`DifftestError::Io`] if the file cannot be read,
/// or [`DifftestError::Yaml`] if the YAML is malformed.
pub fn parse_manifest(path: &Path) -> Result<TemplateManifest, DifftestError> {
    let content = std::fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

/// Parse a template manifest from a string.
pub fn parse_manifest_str(yaml: &str) -> Result<TemplateManifest, DifftestError> {
    let manifest: TemplateManifest = serde_yaml::from_str(yaml)?;
    Ok(manifest)
}

/// Load every template listed in the manifest at `path`.
///
/// Template files are resolved relative to the manifest's directory.
///
/// # Errors
///
/// Returns the first I/O or YAML error encountered.
pub fn load_templates(path: &Path) -> Result<Vec<Template>, DifftestError> {
    let manifest = parse_manifest(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    manifest
        .templates
        .iter()
        .map(|entry| {
            let text = std::fs::read_to_string(dir.join(&entry.file))?;
            Ok(Template::new(&entry.id, &entry.entry, entry.class, text))
        })
        .collect()
}
