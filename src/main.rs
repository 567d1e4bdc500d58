mod agents;
mod catalog;
mod cli;
mod config;
mod error;
mod model;
mod package;
mod utils;
mod workflow;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Update {
            package,
            catalog,
            interactive,
            no_backup,
        } => workflow::execute_update(package, catalog, *interactive, *no_backup),
        Commands::Check { package, catalog } => workflow::execute_check(package, catalog),
        Commands::List { package } => workflow::execute_list(package),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or everything from this crate
/// with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "masterpatch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
