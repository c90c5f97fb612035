use std::path::Path;

use ptx_difftest::codegen;
use ptx_difftest::matrix::{MatrixBuilder, Selection};
use ptx_difftest::oracle::Oracle;
use ptx_difftest::registry::Registry;

use super::{load_config, load_store};

pub fn run(
    point: &str,
    templates: Option<&Path>,
    config: Option<&Path>,
    seed: Option<u64>,
    inputs: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let store = load_store(templates)?;
    let registry = Registry::builtin(config.shift_policy);

    let template_id = point.split('/').next().unwrap_or_default();
    let template = store
        .get(template_id)
        .ok_or_else(|| format!("no template '{template_id}'"))?;
    let selection = Selection::all().with_filter(&format!("^{}$", regex::escape(point)))?;
    let p = MatrixBuilder::new(&registry, template, config.matrix_options())
        .with_selection(selection)
        .points()
        .next()
        .ok_or_else(|| format!("no point named '{point}'"))?;

    let kernel = codegen::expand(template, &p)?;
    print!("{}", kernel.source);

    if inputs {
        let expected = Oracle::new(&registry).expected_output(&p)?;
        println!(
            "\n// {} (seed {}, point seed {:#018x}): {} element(s)",
            p.name,
            config.seed,
            p.seed,
            p.len()
        );
        for i in 0..p.len() {
            let operands: Vec<String> = p
                .inputs
                .iter()
                .map(|b| b.ty.format_value(b.data[i]))
                .collect();
            println!(
                "// [{i}] {} -> {}",
                operands.join(", "),
                p.ty.format_value(expected.data[i])
            );
        }
    }
    Ok(())
}
