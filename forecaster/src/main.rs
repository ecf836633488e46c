// Copyright (c) James Kassemi, SC, US. All rights reserved.
mod pipeline;

use std::{path::PathBuf, process};

use clap::Parser;
use core_types::ForecastConfig;
use tracing_subscriber::filter::LevelFilter;

use pipeline::{AppError, Outcome, PipelineOptions};

#[derive(Parser, Debug)]
#[command(name = "forecaster")]
#[command(about = "Run an autoregressive latent forecast from the latest encoded observation")]
struct Args {
    /// TOML forecast configuration; `FORECAST_*` environment variables override it.
    #[arg(long)]
    config: PathBuf,

    /// Directory holding `YYYY-MM-DDTHH:MM:SSZ.parquet` latent observations.
    #[arg(long)]
    latent_dir: PathBuf,

    /// Parent directory of per-forecast output directories.
    #[arg(long)]
    output_dir: PathBuf,

    /// Recompute a forecast whose output already exists.
    #[arg(long)]
    force: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .init();
    if let Err(err) = run() {
        eprintln!("forecaster failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let args = Args::parse();
    let config = ForecastConfig::load(&args.config)?;
    let options = PipelineOptions {
        latent_dir: args.latent_dir,
        output_dir: args.output_dir,
        force: args.force,
    };
    match pipeline::run_forecast(&config, &options)? {
        Outcome::Skipped { dir } => {
            println!("Forecast already exists at {}; use --force to recompute", dir.display());
        }
        Outcome::Completed { dir, manifest } => {
            println!(
                "Forecast {} written to {} ({} states, trajectory crc32 {:08x})",
                manifest.name,
                dir.display(),
                manifest.trajectory_len,
                manifest.artifacts.trajectory.checksum
            );
        }
    }
    Ok(())
}
