//! `earthgrids borehole`: sweep a depth profile at one location.

use std::io::Write;

use anyhow::Result;
use clap::Args as ClapArgs;
use earthgrids_model::{is_nodata, Query, Status};
use tracing::warn;

use crate::options::{open_output, ModelOptions, SquashOptions};

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub models: ModelOptions,

    /// Values to return at each sample, in output order
    #[arg(long = "values", required = true, num_args = 1.., value_delimiter = ',')]
    pub values: Vec<String>,

    /// Borehole location as "x y" in the input CRS
    #[arg(long = "location", num_args = 2, required = true)]
    pub location: Vec<f64>,

    /// Depth of the borehole below the top surface, in meters
    #[arg(long = "max-depth", default_value_t = 5_000.0)]
    pub max_depth: f64,

    /// Vertical sampling interval, in meters
    #[arg(long = "resolution", default_value_t = 10.0)]
    pub resolution: f64,

    /// Output file; - for stdout
    #[arg(long = "output", default_value = "-")]
    pub output: String,

    #[command(flatten)]
    pub squash: SquashOptions,
}

pub fn run(args: Args) -> Result<()> {
    anyhow::ensure!(args.max_depth > 0.0, "max depth must be positive");
    anyhow::ensure!(args.resolution > 0.0, "resolution must be positive");
    let (x, y) = (args.location[0], args.location[1]);

    let mut query = Query::new();
    query.set_squashing(args.squash.squashing())?;
    query.set_squash_min_elev(args.squash.min_elevation);
    query.initialize(&args.models.models, &args.values, &args.models.input_crs)?;

    let surface = query.query_top_elevation(x, y);
    anyhow::ensure!(
        !is_nodata(surface),
        "no top surface elevation at ({x}, {y}): {}",
        query.error_handler().message()
    );

    let mut output = open_output(&args.output)?;
    writeln!(
        output,
        "# borehole at ({x}, {y}), top surface elevation {surface:.3} m"
    )?;
    writeln!(output, "# depth (m) elevation (m) {}", args.values.join(" "))?;

    let samples = (args.max_depth / args.resolution).floor() as usize;
    let mut values = vec![0.0; query.num_values()];
    for sample in 0..=samples {
        let depth = sample as f64 * args.resolution;
        let elevation = surface - depth;

        match query.query(&mut values, x, y, elevation) {
            Status::Ok => {}
            Status::Warning => warn!("{}", query.error_handler().message()),
            Status::Error => anyhow::bail!("{}", query.error_handler().message()),
        }

        write!(output, "{depth:12.3} {elevation:14.3}")?;
        for value in &values {
            write!(output, " {value:16.8e}")?;
        }
        writeln!(output)?;
    }
    output.flush()?;

    query.finalize();
    Ok(())
}
