use std::path::Path;

use ptx_difftest::error::Severity;
use ptx_difftest::template::parser::load_templates;
use ptx_difftest::template::validator::validate_templates;
use ptx_difftest::template::TemplateStore;

pub fn run(manifest: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    // load without store validation so every violation is reported
    let templates = match manifest {
        Some(path) => load_templates(path)?,
        None => TemplateStore::builtin()?.iter().cloned().collect(),
    };
    let violations = validate_templates(&templates);

    let errors: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Error)
        .collect();
    let warnings: Vec<_> = violations
        .iter()
        .filter(|v| v.severity == Severity::Warning)
        .collect();

    for v in &violations {
        println!("{v}");
    }

    println!(
        "\n{} template(s), {} error(s), {} warning(s)",
        templates.len(),
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        println!("Templates are valid.");
        Ok(())
    } else {
        Err(format!("Templates have {} validation error(s)", errors.len()).into())
    }
}
