//! tenderwatch CLI
//!
//! Runs the monitor on its schedule, or once, against a TOML configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tenderwatch::{
    config::{ensure_config_file, load_config, load_validated, write_default_config},
    error::Result,
    models::Config,
    notify::EmailNotifier,
    pipeline::{JobRunner, Monitor, RunOutcome, Schedule, Scheduler},
    services::ListingSourceProvider,
    storage::{CsvSnapshotStore, SnapshotStore},
    utils::log::LogTee,
};

/// tenderwatch - ADB tender and project listing monitor
#[derive(Parser, Debug)]
#[command(
    name = "tenderwatch",
    version,
    about = "Watches ADB listings and mails a digest of new entries"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run once now, then on the configured schedule until interrupted
    Run,

    /// Run once and exit
    Once,

    /// Validate the configuration file
    Validate,

    /// Show stored snapshot lineages
    Info,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Initialize logging from the config level, or debug when verbose.
///
/// With `logging.file` set, lines also go to that file.
fn init_logging(config_path: &Path, verbose: bool) {
    let logging = Config::load(config_path)
        .map(|c| c.logging)
        .unwrap_or_default();
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone()
    };

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    match logging.file.as_deref().map(|path| (path, LogTee::open(path))) {
        Some((_, Ok(tee))) => {
            builder.target(env_logger::Target::Pipe(Box::new(tee)));
            builder.init();
        }
        Some((path, Err(e))) => {
            builder.init();
            log::warn!("Cannot open log file {}: {e}", path.display());
        }
        None => builder.init(),
    }
}

async fn build_monitor(config: Arc<Config>) -> Result<Monitor> {
    let store = CsvSnapshotStore::open(&config.output_dir).await?;
    let source = ListingSourceProvider::new(Arc::new(config.source.clone()));
    let notifier = EmailNotifier::new(config.email.clone());
    Ok(Monitor::new(
        config,
        Box::new(source),
        Box::new(store),
        Arc::new(notifier),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config, cli.verbose);

    match cli.command {
        Command::Init { force } => {
            if write_default_config(&cli.config, force)? {
                log::info!("Wrote default config to {}", cli.config.display());
            } else {
                log::warn!(
                    "Config already exists at {}. Use --force to overwrite.",
                    cli.config.display()
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            let config = load_validated(&cli.config).inspect_err(|e| {
                log::error!("Config validation failed: {e}");
            })?;
            log::info!(
                "✓ Config OK ({} searches, schedule {})",
                config.lineages().count(),
                Schedule::from_config(&config.schedule)?
            );
        }

        Command::Info => {
            let config = load_config(&cli.config)?;
            let store = CsvSnapshotStore::open(&config.output_dir).await?;
            log::info!("Output directory: {}", store.root_dir().display());

            let lineages = store.lineages();
            if lineages.is_empty() {
                log::info!("No snapshots found yet.");
            }
            for (lineage, latest) in lineages {
                log::info!("{lineage}: latest snapshot {latest}");
            }
        }

        Command::Once => {
            ensure_config_file(&cli.config)?;
            let config = Arc::new(load_validated(&cli.config)?);
            let mut monitor = build_monitor(config).await?;

            if let RunOutcome::Failed(e) = monitor.run_job().await {
                log::error!("Run failed: {e}");
                std::process::exit(1);
            }
        }

        Command::Run => {
            ensure_config_file(&cli.config)?;
            let config = Arc::new(load_validated(&cli.config)?);
            let schedule = Schedule::from_config(&config.schedule)?;
            let poll = Duration::from_secs(config.schedule.poll_interval_secs);
            let mut monitor = build_monitor(config).await?;
            let mut scheduler = Scheduler::new(schedule, poll);

            log::info!("tenderwatch starting...");
            tokio::select! {
                _ = scheduler.run_forever(&mut monitor) => {}
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Interrupted, shutting down");
                }
            }
        }
    }

    Ok(())
}
