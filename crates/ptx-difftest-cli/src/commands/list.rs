use std::path::Path;

use ptx_difftest::matrix::MatrixBuilder;
use ptx_difftest::registry::Registry;

use super::{load_config, load_store, Select};

pub fn run(select: &Select, config: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let store = load_store(select.templates.as_deref())?;
    let selection = select.selection()?;
    let registry = Registry::builtin(config.shift_policy);

    let mut total = 0;
    let mut templates = 0;
    for template in store.iter() {
        let names = MatrixBuilder::new(&registry, template, config.matrix_options())
            .with_selection(selection.clone())
            .names();
        if names.is_empty() {
            continue;
        }
        templates += 1;
        total += names.len();
        for name in names {
            println!("{name}");
        }
    }
    println!("\n{total} point(s) across {templates} template(s)");
    Ok(())
}
