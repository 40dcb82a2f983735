//! bess-sim entry point: CLI wiring, logging setup and report printing.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bess_sim::error::Result;
use bess_sim::io::export::{export_csv, write_json};
use bess_sim::io::load::read_load_file;
use bess_sim::runner::{demo_load, run_simulation};

use cli::Args;

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_configuration() {
                error!("configuration error: {e}");
            } else {
                error!("simulation failed: {e}");
            }
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = args.site_config()?;
    config.ensure_valid()?;

    let load = match &args.load {
        Some(path) => {
            info!(path = %path.display(), "reading load");
            read_load_file(path)?
        }
        None => {
            info!(days = args.demo_days, seed = args.seed, "generating synthetic load");
            demo_load(args.demo_days, args.seed)
        }
    };

    let output = run_simulation(&config, load)?;

    println!("Site: {} ({})", config.location.name, config.ems.control_mode);
    println!();
    println!("{}", output.analysis);
    println!();
    println!("{}", output.recommendations);

    if let Some(path) = &args.trace_out {
        export_csv(&output.data, path)?;
        info!(path = %path.display(), "trace exported");
    }
    if let Some(path) = &args.json_out {
        write_json(&output, path)?;
        info!(path = %path.display(), "output written");
    }
    Ok(())
}
