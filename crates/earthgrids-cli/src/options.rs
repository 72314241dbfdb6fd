//! Shared command-line options and point I/O helpers.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use earthgrids_model::Squashing;

/// Options shared by every query-like subcommand.
#[derive(Args, Debug)]
pub struct ModelOptions {
    /// Model containers to search, in query order
    #[arg(long = "models", required = true, num_args = 1.., value_delimiter = ',')]
    pub models: Vec<PathBuf>,

    /// CRS of input points (EPSG code, WKT, or proj string)
    #[arg(long = "input-crs", default_value = "EPSG:4326")]
    pub input_crs: String,
}

/// Vertical squashing options.
#[derive(Args, Debug)]
pub struct SquashOptions {
    /// Treat z as depth relative to a surface instead of elevation
    #[arg(long = "squash-surface", value_enum, default_value = "none")]
    pub surface: SquashArg,

    /// Elevation (m) above which squashing applies
    #[arg(long = "squash-min-elev", default_value_t = 0.0)]
    pub min_elevation: f64,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SquashArg {
    None,
    TopSurface,
    TopographyBathymetry,
}

impl SquashOptions {
    pub fn squashing(&self) -> Squashing {
        match self.surface {
            SquashArg::None => Squashing::None,
            SquashArg::TopSurface => Squashing::TopSurface,
            SquashArg::TopographyBathymetry => Squashing::TopographyBathymetry,
        }
    }
}

/// Open a point source: a path, or `-` for stdin.
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        let file = File::open(path).with_context(|| format!("failed to open points file '{path}'"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Open an output sink: a path, or `-` for stdout.
pub fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == "-" {
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        let file =
            File::create(path).with_context(|| format!("failed to create output file '{path}'"))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

/// Parse one whitespace-separated line of coordinates; empty lines and `#`
/// comments yield `None`.
pub fn parse_point(line: &str, expected: usize) -> Result<Option<Vec<f64>>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let coords = trimmed
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .with_context(|| format!("malformed coordinate '{token}' in line '{trimmed}'"))
        })
        .collect::<Result<Vec<f64>>>()?;
    anyhow::ensure!(
        coords.len() == expected,
        "expected {expected} coordinates per line, found {} in '{trimmed}'",
        coords.len()
    );
    Ok(Some(coords))
}
