pub mod emulate;
pub mod expand;
pub mod list;
pub mod run;
pub mod validate;

use std::path::{Path, PathBuf};

use ptx_difftest::config::{parse_config, RunConfig};
use ptx_difftest::matrix::Selection;
use ptx_difftest::template::TemplateStore;

/// Point selection flags shared by `list` and `run`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Select {
    /// Template manifest (default: bundled templates)
    #[arg(long)]
    pub templates: Option<PathBuf>,
    /// Only run this template id (repeatable)
    #[arg(long = "template")]
    pub template_ids: Vec<String>,
    /// Only this element type, e.g. s32 (repeatable)
    #[arg(long = "type")]
    pub types: Vec<String>,
    /// Only this operation mnemonic, e.g. mul.lo (repeatable)
    #[arg(long = "op")]
    pub ops: Vec<String>,
    /// Regex matched against point names
    #[arg(long)]
    pub filter: Option<String>,
}

impl Select {
    pub fn selection(&self) -> Result<Selection, Box<dyn std::error::Error>> {
        let selection = Selection {
            templates: self.template_ids.clone(),
            types: self.types.clone(),
            operations: self.ops.clone(),
            filter: None,
        };
        match &self.filter {
            Some(pattern) => Ok(selection.with_filter(pattern)?),
            None => Ok(selection),
        }
    }
}

/// Templates from `manifest`, or the bundled set.
pub fn load_store(manifest: Option<&Path>) -> Result<TemplateStore, Box<dyn std::error::Error>> {
    let store = match manifest {
        Some(path) => TemplateStore::load(path)?,
        None => TemplateStore::builtin()?,
    };
    Ok(store)
}

pub fn load_config(path: Option<&Path>) -> Result<RunConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(parse_config(p)?),
        None => Ok(RunConfig::default()),
    }
}
