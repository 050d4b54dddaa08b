//! CLI binary for odograph: load an Odoo source tree into the dependency
//! graph, inspect it, clear it.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::warn;

use odograph::pipeline::{self, LoadOptions};
use odograph::report;
use odograph_core::config::AnalyzerConfig;
use odograph_core::state::StateStore;
use odograph_graph::loader::{GraphLoader, GraphStats};
use odograph_graph::store::{connect, GraphConfig};

#[derive(Parser)]
#[command(name = "odograph", about = "Odoo dependency graph ETL", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the source tree and load it into the graph store
    Load {
        /// Corpus root (defaults to ODOO_SOURCE_PATH)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Force a full reload, ignoring incremental state
        #[arg(long)]
        full: bool,

        /// Clear the graph before loading
        #[arg(long)]
        clear: bool,
    },

    /// Print node counts
    Stats,

    /// Delete the whole graph and the incremental state
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Load {
            source,
            full,
            clear,
        } => cmd_load(source, full, clear),
        Commands::Stats => cmd_stats(),
        Commands::Clear { yes } => cmd_clear(yes),
    }
}

fn cmd_load(source: Option<PathBuf>, full: bool, clear: bool) -> Result<()> {
    let mut config = AnalyzerConfig::from_env();
    if let Some(source) = source {
        config.source_path = source;
    }
    println!(
        "{} {}",
        "Analyzing Odoo sources in:".bold().blue(),
        config.source_path.display()
    );

    let store = connect(&GraphConfig::from_env())?;
    let outcome = pipeline::run_load(&config, store, LoadOptions { full, clear })?;
    report::print_outcome(&outcome);
    Ok(())
}

fn cmd_stats() -> Result<()> {
    let config = AnalyzerConfig::from_env();
    let stats = match connect(&GraphConfig::from_env()) {
        Ok(store) => GraphLoader::new(store, config.batch_size).stats(),
        Err(err) => {
            warn!(%err, "graph store not available; reporting zeros");
            GraphStats::default()
        }
    };
    report::print_stats(&stats);
    Ok(())
}

fn cmd_clear(yes: bool) -> Result<()> {
    let confirmed = yes
        || dialoguer::Confirm::new()
            .with_prompt("Delete every node, relationship and the incremental state?")
            .default(false)
            .interact()?;
    if !confirmed {
        println!("aborted");
        return Ok(());
    }

    let config = AnalyzerConfig::from_env();
    let store = connect(&GraphConfig::from_env())?;
    GraphLoader::new(store, config.batch_size).clear()?;

    let mut state = StateStore::open(config.state_file());
    state.clear()?;

    println!("{}", "Graph and state cleared".yellow());
    Ok(())
}
