//! `earthgrids query`: interpolate values at points.

use std::io::Write;

use anyhow::Result;
use clap::Args as ClapArgs;
use earthgrids_model::{Query, Status};
use earthgrids_utils::crs_units;
use tracing::warn;

use crate::options::{open_input, open_output, parse_point, ModelOptions, SquashOptions};

#[derive(ClapArgs, Debug)]
pub struct Args {
    #[command(flatten)]
    pub models: ModelOptions,

    /// Values to return at each point, in output order
    #[arg(long = "values", required = true, num_args = 1.., value_delimiter = ',')]
    pub values: Vec<String>,

    /// Input points, one "x y z" per line; - for stdin
    #[arg(long = "points", default_value = "-")]
    pub points: String,

    /// Output file; - for stdout
    #[arg(long = "output", default_value = "-")]
    pub output: String,

    #[command(flatten)]
    pub squash: SquashOptions,
}

pub fn run(args: Args) -> Result<()> {
    let mut query = Query::new();
    query.set_squashing(args.squash.squashing())?;
    query.set_squash_min_elev(args.squash.min_elevation);
    query.initialize(&args.models.models, &args.values, &args.models.input_crs)?;

    let input = open_input(&args.points)?;
    let mut output = open_output(&args.output)?;

    let (x_unit, y_unit, z_unit) = crs_units(&args.models.input_crs);
    writeln!(
        output,
        "# x ({x_unit}) y ({y_unit}) z ({z_unit}) {}",
        args.values.join(" ")
    )?;

    let mut values = vec![0.0; query.num_values()];
    for line in input.lines() {
        let line = line?;
        let Some(point) = parse_point(&line, 3)? else {
            continue;
        };
        let (x, y, z) = (point[0], point[1], point[2]);

        match query.query(&mut values, x, y, z) {
            Status::Ok => {}
            Status::Warning => warn!("{}", query.error_handler().message()),
            Status::Error => anyhow::bail!("{}", query.error_handler().message()),
        }

        write!(output, "{x:16.8e} {y:16.8e} {z:16.8e}")?;
        for value in &values {
            write!(output, " {value:16.8e}")?;
        }
        writeln!(output)?;
    }
    output.flush()?;

    query.finalize();
    Ok(())
}
