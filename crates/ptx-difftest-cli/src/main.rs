use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use ptx_difftest::kernels::bitwise::ShiftPolicy;

mod commands;
mod logging;

/// Top-level CLI argument parser for the `pdt` command
#[derive(Parser)]
#[command(
    name = "pdt",
    about = "ptx-difftest — differential validation of generated PTX kernels",
    version
)]
struct Cli {
    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    /// Log format: pretty, compact, or json
    #[arg(long, global = true, default_value = "compact")]
    log_format: String,
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands for the `pdt` CLI
#[derive(Subcommand)]
enum Commands {
    /// List matrix points in run order
    List {
        #[command(flatten)]
        select: commands::Select,
        /// Run configuration YAML
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate kernel templates
    Validate {
        /// Template manifest (default: bundled templates)
        #[arg(long)]
        templates: Option<PathBuf>,
    },
    /// Print the kernel generated for one point, with its inputs
    Expand {
        /// Point name, e.g. bfe/bfe.s32/p28_l4
        point: String,
        /// Template manifest (default: bundled templates)
        #[arg(long)]
        templates: Option<PathBuf>,
        /// Run configuration YAML
        #[arg(long)]
        config: Option<PathBuf>,
        /// Run seed (overrides the config file)
        #[arg(long)]
        seed: Option<u64>,
        /// Also print input buffers and expected output
        #[arg(long)]
        inputs: bool,
    },
    /// Run the matrix through an execution driver
    Run {
        #[command(flatten)]
        select: commands::Select,
        #[command(flatten)]
        options: commands::run::RunOptions,
        /// Driver command and arguments, after `--`
        #[arg(last = true)]
        driver: Vec<String>,
    },
    /// Answer one driver request from stdin using the host emulator
    Emulate {
        /// Shift semantics for amounts at or beyond the operand width
        #[arg(long, default_value = "clamp")]
        shift_policy: ShiftPolicy,
    },
}

/// Dispatch a parsed CLI subcommand to its handler
fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::List { select, config } => commands::list::run(&select, config.as_deref()),
        Commands::Validate { templates } => commands::validate::run(templates.as_deref()),
        Commands::Expand {
            point,
            templates,
            config,
            seed,
            inputs,
        } => commands::expand::run(&point, templates.as_deref(), config.as_deref(), seed, inputs),
        Commands::Run {
            select,
            options,
            driver,
        } => commands::run::run(&select, &options, &driver),
        Commands::Emulate { shift_policy } => commands::emulate::run(shift_policy),
    }
}

/// Entry point: parse CLI arguments and run the selected subcommand
fn main() {
    let cli = Cli::parse();
    logging::init(&cli.log_level, &cli.log_format);

    if let Err(e) = run_command(cli.command) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
