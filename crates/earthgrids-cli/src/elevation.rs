//! `earthgrids elevation`: sample a surface at points.

use std::io::Write;

use anyhow::Result;
use clap::{Args as ClapArgs, ValueEnum};
use earthgrids_model::Query;
use earthgrids_utils::crs_units;

use crate::options::{open_input, open_output, parse_point, ModelOptions};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceArg {
    Top,
    TopographyBathymetry,
}

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub models: ModelOptions,

    /// Surface to sample
    #[arg(long = "surface", value_enum, default_value = "top")]
    pub surface: SurfaceArg,

    /// Input points, one "x y" per line; - for stdin
    #[arg(long = "points", default_value = "-")]
    pub points: String,

    /// Output file; - for stdout
    #[arg(long = "output", default_value = "-")]
    pub output: String,
}

pub fn run(args: Args) -> Result<()> {
    let mut query = Query::new();
    let no_values: [&str; 0] = [];
    query.initialize(&args.models.models, &no_values, &args.models.input_crs)?;

    let input = open_input(&args.points)?;
    let mut output = open_output(&args.output)?;

    let (x_unit, y_unit, _) = crs_units(&args.models.input_crs);
    writeln!(output, "# x ({x_unit}) y ({y_unit}) elevation (m)")?;

    for line in input.lines() {
        let line = line?;
        let Some(point) = parse_point(&line, 2)? else {
            continue;
        };
        let (x, y) = (point[0], point[1]);
        let elevation = match args.surface {
            SurfaceArg::Top => query.query_top_elevation(x, y),
            SurfaceArg::TopographyBathymetry => query.query_topobathy_elevation(x, y),
        };
        writeln!(output, "{x:16.8e} {y:16.8e} {elevation:16.8e}")?;
    }
    output.flush()?;

    query.finalize();
    Ok(())
}
