//! Disk-integrated synthetic spectra of pulsating stars from BRUCE mesh
//! snapshots.
pub mod cli;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod reader;
pub mod writer;

pub use error::{ErrorKind, KylieError, KylieResult};

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

pub fn run() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))?;

    let options = processor::RunOptions {
        work_dir: args.work_dir.clone(),
        distance_pc: args.distance,
    };

    let summary = processor::run_kylie(&args.input, &options)
        .with_context(|| format!("KYLIE run of {}", args.input.display()))?;
    tracing::info!("{} spectra written", summary.written.len());

    Ok(())
}
