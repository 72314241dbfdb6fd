//! `earthgrids info`: print model metadata.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use earthgrids_model::{Model, OpenMode};
use serde_json::json;

#[derive(ClapArgs, Debug)]
pub struct Args {
    /// Model containers to describe
    #[arg(required = true)]
    pub models: Vec<PathBuf>,

    /// Emit machine-readable JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: Args) -> Result<()> {
    for path in &args.models {
        let mut model = Model::open(path, OpenMode::Read)
            .with_context(|| format!("failed to open model '{}'", path.display()))?;
        model
            .load_metadata("EPSG:4326")
            .with_context(|| format!("failed to load metadata for '{}'", path.display()))?;

        if args.json {
            print_json(&model)?;
        } else {
            print_text(&model);
        }
    }
    Ok(())
}

fn print_text(model: &Model) {
    let info = model.info();
    println!("Model: {}", model.path().display());
    println!("  Title: {}", info.title);
    println!("  Id: {}", info.id);
    println!("  Description: {}", info.description);
    println!("  Keywords: {}", info.keywords.join(", "));
    println!("  Authors: {}", info.authors.join("; "));
    println!("  References: {}", info.references.join("; "));
    println!(
        "  Repository: {} ({}), DOI {}",
        info.repository_name, info.repository_url, info.repository_doi
    );
    println!("  Version: {}  License: {}", info.version, info.license);
    println!(
        "  Creator: {} <{}>, {}",
        info.creator_name, info.creator_email, info.creator_institution
    );

    println!("  CRS: {}", model.crs());
    let origin = model.origin();
    println!(
        "  Origin: ({}, {})  y azimuth: {} deg",
        origin[0],
        origin[1],
        model.y_azimuth()
    );
    let dims = model.dims();
    println!("  Extents: {} x {} x {} m", dims[0], dims[1], dims[2]);
    println!("  Data layout: {:?}", model.data_layout());

    println!("  Values:");
    for (name, unit) in model.value_names().iter().zip(model.value_units()) {
        println!("    {name} ({unit})");
    }

    println!("  Surfaces:");
    match model.top_surface() {
        Some(surface) => {
            let dims = surface.dims();
            println!("    top_surface: {} x {}", dims[0], dims[1]);
        }
        None => println!("    top_surface: none"),
    }
    match model.topography_bathymetry() {
        Some(surface) => {
            let dims = surface.dims();
            println!("    topography_bathymetry: {} x {}", dims[0], dims[1]);
        }
        None => println!("    topography_bathymetry: none"),
    }

    println!("  Blocks:");
    for block in model.blocks() {
        let dims = block.dims();
        println!(
            "    {}: {} x {} x {} nodes, z in [{}, {}]",
            block.name(),
            dims[0],
            dims[1],
            dims[2],
            block.z_bottom(),
            block.z_top()
        );
    }
}

fn print_json(model: &Model) -> Result<()> {
    let surfaces = json!({
        "top_surface": model.top_surface().map(|s| s.dims()),
        "topography_bathymetry": model.topography_bathymetry().map(|s| s.dims()),
    });
    let blocks: Vec<_> = model
        .blocks()
        .iter()
        .map(|block| {
            json!({
                "name": block.name(),
                "dims": block.dims(),
                "num_values": block.num_values(),
                "z_top": block.z_top(),
                "z_bottom": block.z_bottom(),
            })
        })
        .collect();

    let document = json!({
        "path": model.path(),
        "info": model.info(),
        "crs": model.crs(),
        "origin": model.origin(),
        "y_azimuth": model.y_azimuth(),
        "dims": model.dims(),
        "data_layout": model.data_layout(),
        "values": model
            .value_names()
            .iter()
            .zip(model.value_units())
            .map(|(name, unit)| json!({"name": name, "units": unit}))
            .collect::<Vec<_>>(),
        "surfaces": surfaces,
        "blocks": blocks,
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
