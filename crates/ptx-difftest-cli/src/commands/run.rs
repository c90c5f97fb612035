use std::path::PathBuf;
use std::sync::Arc;

use ptx_difftest::config::RunConfig;
use ptx_difftest::driver::{CommandDriver, EmulatorDriver, ExecutionDriver};
use ptx_difftest::kernels::bitwise::ShiftPolicy;
use ptx_difftest::registry::Registry;
use ptx_difftest::report::{format_json, format_text};
use ptx_difftest::runner::Runner;
use tracing::info;

use super::{load_config, load_store, Select};

#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Flags for `pdt run`; each overrides the matching config field.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Run configuration YAML
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Run seed
    #[arg(long)]
    pub seed: Option<u64>,
    /// Random elements per point, after the edge values
    #[arg(long)]
    pub samples: Option<usize>,
    /// Per-point driver timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    pub jobs: Option<usize>,
    /// Float tolerance in units in the last place
    #[arg(long)]
    pub max_ulp: Option<u64>,
    /// Shift semantics: clamp or mask
    #[arg(long)]
    pub shift_policy: Option<ShiftPolicy>,
    /// Skip zero-length bit fields
    #[arg(long)]
    pub no_zero_length: bool,
    /// Run kernels on the host emulator
    #[arg(long)]
    pub emulate: bool,
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
    /// Also list passing points
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunOptions {
    fn resolve_config(&self) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(samples) = self.samples {
            config.random_samples = samples;
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout_ms = ms;
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(ulp) = self.max_ulp {
            config.float_max_ulp = ulp;
        }
        if let Some(policy) = self.shift_policy {
            config.shift_policy = policy;
        }
        if self.no_zero_length {
            config.zero_length_bit_fields = false;
        }
        Ok(config)
    }
}

/// Pick a driver: an explicit command wins, then `--emulate`, then the
/// config file's driver section.
fn resolve_driver(
    command: &[String],
    emulate: bool,
    config: &RunConfig,
    registry: &Registry,
) -> Result<Arc<dyn ExecutionDriver>, Box<dyn std::error::Error>> {
    if let Some((program, args)) = command.split_first() {
        return Ok(Arc::new(CommandDriver::new(program, args.to_vec())));
    }
    if emulate {
        return Ok(Arc::new(EmulatorDriver::new(registry.clone())));
    }
    if let Some(d) = &config.driver {
        return Ok(Arc::new(
            CommandDriver::new(&d.program, d.args.clone()).with_concurrency(d.concurrency),
        ));
    }
    Err("no execution driver: pass --emulate, a driver command after `--`, \
         or a `driver` section in the config"
        .into())
}

pub fn run(
    select: &Select,
    options: &RunOptions,
    driver_command: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.resolve_config()?;
    let store = load_store(select.templates.as_deref())?;
    let selection = select.selection()?;
    let registry = Registry::builtin(config.shift_policy);
    let driver = resolve_driver(driver_command, options.emulate, &config, &registry)?;
    info!(driver = driver.name(), templates = store.len(), "driver ready");

    let report = Runner::new(&registry, driver, config)
        .with_selection(selection)
        .run(&store)?;

    match options.format {
        ReportFormat::Text => print!("{}", format_text(&report, options.verbose)),
        ReportFormat::Json => println!("{}", format_json(&report)?),
    }

    if report.all_passed() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} point(s) failed, {} template(s) rejected",
            report.summary.failed(),
            report.summary.total,
            report.summary.rejected_templates
        )
        .into())
    }
}
