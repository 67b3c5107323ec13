//! recstage - stage harvested metadata records
//!
//! Imports harvested payloads into a DuckDB record store, keeps
//! host/component hierarchies consistent and queues records for dedup.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "recstage")]
#[command(about = "Record staging and hierarchy pipeline for harvested metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./recstage.toml or ~/.config/recstage/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Record store path (overrides [store] path)
    #[arg(long, global = true)]
    store: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Store harvested payload files for a source
    Import(cmd::import::ImportArgs),
    /// Retire all records harvested under an OAI identifier
    Delete(cmd::delete::DeleteArgs),
    /// Full reharvest: import and retire everything not seen
    Reharvest(cmd::reharvest::ReharvestArgs),
    /// Print a stored record as JSON
    Show(cmd::show::ShowArgs),
    /// List configured sources and their host linkage
    Sources,
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(recstage_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, progress bars show activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    recstage_core::init_logging(quiet, cli.debug, multi);

    recstage_core::install_signal_handlers().context("Failed to install signal handlers")?;

    let mut config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };
    if let Some(path) = cli.store {
        config.store.path = path;
    }

    match cli.command {
        Command::Import(args) => cmd::import::run(args, &config, &progress),
        Command::Delete(args) => cmd::delete::run(args, &config),
        Command::Reharvest(args) => cmd::reharvest::run(args, &config, &progress),
        Command::Show(args) => cmd::show::run(args, &config),
        Command::Sources => cmd::sources::run(&config),
        Command::Config => {
            let mut table = cmd::table(&["Setting", "Value"]);
            table.add_row(vec![
                "Store path".to_string(),
                config.store.path.display().to_string(),
            ]);
            table.add_row(vec![
                "Mark seen".to_string(),
                config.ingest.mark_seen.to_string(),
            ]);
            table.add_row(vec![
                "Sources".to_string(),
                config.sources.len().to_string(),
            ]);
            eprintln!("\n{table}");
            Ok(())
        }
    }
}
