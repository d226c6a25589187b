use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;

mod cli;

use cli::Cli;
use devstack::config::Config;
use devstack::signals::SignalListener;
use devstack::{RunMode, Supervisor};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devstack")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("devstack.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<()> {
    info!("Starting supervisor in {}", cli.root.display());

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Project root: {}", cli.root.display());
        println!("  Health check: {}", config.health_url());
        println!(
            "  Readiness:    {} attempts, {}ms deadline",
            config.readiness.max_attempts, config.readiness.deadline_ms
        );
    }

    // Installed before any side effect so an early Ctrl+C still reaches teardown
    let mut signals = SignalListener::install().context("Failed to install signal handlers")?;
    let shutdown = async move {
        let name = signals.recv().await;
        info!("Received {}", name);
        println!();
        println!("{} {}", "Received".yellow(), name);
    };

    let summary = Supervisor::new(config, &cli.root).run(shutdown).await?;

    info!(
        "Supervisor stopped: mode={:?} spawned={} stopped={:?}",
        summary.mode, summary.spawned, summary.stopped
    );
    if summary.mode == Some(RunMode::BackendOnly) {
        info!("Ran in backend-only mode");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Any error here exits with status 1
    run_application(&cli, config).await.context("Supervisor failed")?;

    Ok(())
}
