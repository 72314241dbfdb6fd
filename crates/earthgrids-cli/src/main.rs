//! Command-line utilities for layered 3-D earth models.
//!
//! One binary, four subcommands:
//! - `info` prints model metadata,
//! - `query` interpolates values at points read from a file or stdin,
//! - `elevation` samples the top or topography/bathymetry surface,
//! - `borehole` sweeps a depth profile at a fixed location.

mod borehole;
mod elevation;
mod info;
mod options;
mod query;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "earthgrids")]
#[command(about = "Query layered 3-D earth models", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print model metadata
    Info(info::Args),
    /// Query values at points
    Query(query::Args),
    /// Query surface elevations at points
    Elevation(elevation::Args),
    /// Sweep a depth profile at one location
    Borehole(borehole::Args),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Info(args) => info::run(args),
        Command::Query(args) => query::run(args),
        Command::Elevation(args) => elevation::run(args),
        Command::Borehole(args) => borehole::run(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
