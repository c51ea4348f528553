//! vaultwatch daemon binary entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use vaultwatch_core::config::VaultConfig;
use vaultwatch_core::export;
use vaultwatch_core::{Engine, IngestQueue, OverflowPolicy};
use vaultwatch_daemon::{Daemon, LogPublisher};

/// vaultwatch - vault access monitoring engine.
#[derive(Parser, Debug)]
#[command(name = "vaultwatch", version, about)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "~/.config/vaultwatch/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the engine poll loop (default).
    Run,
    /// Print an inference sub-log from the external result log as CSV.
    Export {
        /// Which sub-log to export.
        #[arg(value_enum)]
        log: ExportTarget,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportTarget {
    Face,
    Voice,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = expand_tilde(&args.config);
    let config = VaultConfig::load(&config_path).context("loading configuration")?;

    // Log filter priority: VAULTWATCH_LOG env var > [poll] log_level > default.
    let env_filter = EnvFilter::try_from_env("VAULTWATCH_LOG").unwrap_or_else(|_| {
        if let Some(ref level) = config.poll.log_level {
            EnvFilter::new(level.clone())
        } else {
            EnvFilter::from_default_env()
        }
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(config = %config_path.display(), "vaultwatch starting");

    match args.command {
        Some(Command::Run) | None => {
            let daemon = Daemon::new(config, Arc::new(LogPublisher));
            daemon.run().await
        }
        Some(Command::Export { log }) => {
            // One backfill pass over the external result log, then print.
            let queue = Arc::new(IngestQueue::new(1, OverflowPolicy::DropOldest));
            let mut engine = Engine::new(config.fusion.clone(), queue);
            engine.backfill(&config.backfill.results_path);

            let csv = match log {
                ExportTarget::Face => export::inference_csv(engine.face_log()),
                ExportTarget::Voice => export::inference_csv(engine.voice_log()),
            };
            print!("{csv}");
            Ok(())
        }
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(rest);
        }
        return PathBuf::from("/tmp").join(rest);
    }
    PathBuf::from(path)
}
