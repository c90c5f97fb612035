use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::codegen::binding_names;
use crate::error::{Severity, Violation};
use crate::template::types::Template;

static NEAR_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)>").expect("static pattern"));

/// Validate a set of templates for structural soundness.
///
/// Returns a list of violations. Any [`Severity::Error`] makes the set
/// unusable: no matrix can be built from a malformed template.
pub fn validate_templates(templates: &[Template]) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut ids = HashSet::new();
    for t in templates {
        if !ids.insert(t.id.as_str()) {
            violations.push(Violation {
                severity: Severity::Error,
                rule: "TPL-008".to_string(),
                message: format!("Duplicate template ID: {}", t.id),
                location: Some(t.id.clone()),
            });
        }
        violations.extend(validate_template(t));
    }
    violations
}

/// Validate a single template.
pub fn validate_template(template: &Template) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_identity(template, &mut violations);
    validate_text(template, &mut violations);
    validate_bindings(template, &mut violations);
    violations
}

fn validate_identity(t: &Template, violations: &mut Vec<Violation>) {
    if t.id.trim().is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "TPL-006".to_string(),
            message: "template id must not be empty".to_string(),
            location: None,
        });
    }
    if t.entry.trim().is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "TPL-007".to_string(),
            message: format!("{}.entry must not be empty", t.id),
            location: Some(format!("{}.entry", t.id)),
        });
    }
}

fn validate_text(t: &Template, violations: &mut Vec<Violation>) {
    if t.text.trim().is_empty() {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "TPL-001".to_string(),
            message: format!("{}: template text is empty", t.id),
            location: Some(t.id.clone()),
        });
        return;
    }

    if !t.references("OP") {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "TPL-002".to_string(),
            message: format!(
                "{}: template never references <OP>; \
                 every expansion would run the same instruction",
                t.id
            ),
            location: Some(t.id.clone()),
        });
    }

    if !t.entry.is_empty() && !declares_entry(&t.text, &t.entry) {
        violations.push(Violation {
            severity: Severity::Error,
            rule: "TPL-003".to_string(),
            message: format!("{}: no `.entry {}` in template text", t.id, t.entry),
            location: Some(format!("{}.entry", t.id)),
        });
    }

    for cap in NEAR_PLACEHOLDER.captures_iter(&t.text) {
        let name = &cap[1];
        if !t.placeholders.contains(name) {
            violations.push(Violation {
                severity: Severity::Warning,
                rule: "TPL-009".to_string(),
                message: format!(
                    "{}: <{name}> looks like a placeholder but is not upper-case; \
                     it will be emitted verbatim",
                    t.id
                ),
                location: Some(t.id.clone()),
            });
        }
    }
}

fn validate_bindings(t: &Template, violations: &mut Vec<Violation>) {
    let bindable = binding_names(t.class);
    for name in &t.placeholders {
        if !bindable.contains(name) {
            violations.push(Violation {
                severity: Severity::Warning,
                rule: "TPL-004".to_string(),
                message: format!(
                    "{}: <{name}> has no binding for {} templates; \
                     expansion will fail",
                    t.id, t.class
                ),
                location: Some(t.id.clone()),
            });
        }
    }

    if t.class.has_bit_field() && !(t.references("POS") && t.references("LEN")) {
        violations.push(Violation {
            severity: Severity::Warning,
            rule: "TPL-005".to_string(),
            message: format!(
                "{}: bit-field template does not reference both <POS> and <LEN>",
                t.id
            ),
            location: Some(t.id.clone()),
        });
    }
}

fn declares_entry(text: &str, entry: &str) -> bool {
    text.lines().any(|line| {
        line.split_whitespace()
            .skip_while(|tok| *tok != ".entry")
            .nth(1)
            .is_some_and(|name| name.trim_end_matches('(') == entry)
    })
}
