// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use depthcloud::Config;
use depthcloud::constants::app_info;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod cli;

#[derive(Parser)]
#[command(name = "depthcloud")]
#[command(about = "Depth camera point cloud and body skeleton viewer")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Configuration file (default: <config dir>/depthcloud/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Start in fullscreen
    #[arg(long)]
    fullscreen: bool,

    /// Disable body tracking
    #[arg(long)]
    no_tracking: bool,

    /// Number of bodies the tracker reports
    #[arg(short, long)]
    bodies: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print configuration, calibration and a one-frame reconstruction summary
    Info,

    /// Write the default configuration file
    WriteConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=depthcloud=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Info) => cli::show_info(&load_config(&cli)?),
        Some(Commands::WriteConfig { force }) => cli::write_config(cli.config.as_deref(), *force),
        None => run_viewer(load_config(&cli)?),
    }
}

/// Load the configuration file and apply command line overrides
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;
    if cli.fullscreen {
        config.window.fullscreen = true;
    }
    if cli.no_tracking {
        config.tracking.enabled = false;
    }
    if let Some(bodies) = cli.bodies {
        config.tracking.max_bodies = bodies;
    }
    Ok(config)
}

fn run_viewer(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_flag.store(true, Ordering::SeqCst);
    })?;

    depthcloud::viewer::run(config, shutdown)?;
    Ok(())
}
