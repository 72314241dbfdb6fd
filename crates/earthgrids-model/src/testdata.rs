//! Test fixture builders.
//!
//! Builders for small model containers with analytic value fields, used by
//! the unit and integration tests. The value fields are linear in each
//! coordinate, so trilinear interpolation reproduces them exactly and tests
//! can compare against the closed-form expressions at arbitrary points.
//!
//! Every fixture uses a projected model CRS (California Albers). The flat
//! fixtures place queries in the model CRS itself so input coordinates are
//! model coordinates plus the origin; the topography fixture spans a 300 km
//! box in the Mojave so geographic (EPSG:4326) queries land inside it.

use std::error::Error;
use std::path::Path;

use netcdf::AttributeValue;

/// Model CRS shared by all fixtures (NAD83 / California Albers, meters).
pub const MODEL_CRS: &str = "EPSG:3310";

/// Origin of the flat fixtures in the model CRS.
pub const ORIGIN_X: f64 = 200_000.0;
pub const ORIGIN_Y: f64 = -400_000.0;

/// Origin of the topography fixture, chosen so (lat 35.1, lon -117.7) falls
/// inside its 300 km x 300 km footprint.
pub const GEO_ORIGIN_X: f64 = 100_000.0;
pub const GEO_ORIGIN_Y: f64 = -450_000.0;

/// First analytic value ("one"), linear in model x, y and elevation.
pub fn value_one(x: f64, y: f64, z: f64) -> f64 {
    2000.0 + 1.0 * x + 0.4 * y - 0.5 * z
}

/// Second analytic value ("two").
pub fn value_two(x: f64, y: f64, z: f64) -> f64 {
    -1200.0 + 2.1 * x - 0.9 * y + 0.3 * z
}

/// Top-surface elevation of the topography fixture, in model coordinates.
pub fn top_elevation(x: f64, y: f64) -> f64 {
    150.0 + 0.002 * x + 0.001 * y
}

/// Topography/bathymetry elevation of the topography fixture.
pub fn topobathy_elevation(x: f64, y: f64) -> f64 {
    top_elevation(x, y) - 40.0
}

/// One block spanning a model.
pub struct BlockFixture {
    pub name: &'static str,
    pub resolution: f64,
    pub z_top: f64,
    pub z_resolution: f64,
    pub nz: usize,
    /// Write explicit descending `z_coordinates` instead of `z_resolution`
    /// plus `z_top`.
    pub variable_z: bool,
}

/// One model container.
pub struct ModelFixture {
    pub title: &'static str,
    pub origin: (f64, f64),
    pub y_azimuth: f64,
    pub dims: (f64, f64, f64),
    /// Horizontal node spacing for surfaces.
    pub resolution: f64,
    /// (name, units) per value, in native model order.
    pub values: Vec<(&'static str, &'static str)>,
    pub top_surface: bool,
    pub topo_bathy: bool,
    /// Write the topography/bathymetry surface with explicit coordinate
    /// vectors instead of uniform resolutions.
    pub variable_surface_coords: bool,
    pub blocks: Vec<BlockFixture>,
}

/// Fixture 1: one 30 km x 30 km x 5 km block, flat, two values.
pub fn one_block_flat_fixture() -> ModelFixture {
    ModelFixture {
        title: "One block flat",
        origin: (ORIGIN_X, ORIGIN_Y),
        y_azimuth: 0.0,
        dims: (30_000.0, 30_000.0, 5_000.0),
        resolution: 10_000.0,
        values: vec![("one", "m/s"), ("two", "m/s")],
        top_surface: false,
        topo_bathy: false,
        variable_surface_coords: false,
        blocks: vec![BlockFixture {
            name: "block",
            resolution: 10_000.0,
            z_top: 0.0,
            z_resolution: 1_000.0,
            nz: 6,
            variable_z: false,
        }],
    }
}

/// Fixture 2: three stacked blocks with coarsening resolution, flat.
pub fn three_blocks_flat_fixture() -> ModelFixture {
    ModelFixture {
        title: "Three blocks flat",
        origin: (ORIGIN_X, ORIGIN_Y),
        y_azimuth: 0.0,
        dims: (60_000.0, 60_000.0, 45_000.0),
        resolution: 10_000.0,
        values: vec![("one", "m/s"), ("two", "m/s")],
        top_surface: false,
        topo_bathy: false,
        variable_surface_coords: false,
        blocks: vec![
            BlockFixture {
                name: "top",
                resolution: 10_000.0,
                z_top: 0.0,
                z_resolution: 1_000.0,
                nz: 6,
                variable_z: false,
            },
            BlockFixture {
                name: "middle",
                resolution: 20_000.0,
                z_top: -5_000.0,
                z_resolution: 5_000.0,
                nz: 5,
                variable_z: true,
            },
            BlockFixture {
                name: "bottom",
                resolution: 30_000.0,
                z_top: -25_000.0,
                z_resolution: 10_000.0,
                nz: 3,
                variable_z: false,
            },
        ],
    }
}

/// Fixture 3: three stacked blocks under a sloping top surface and a
/// topography/bathymetry surface 40 m below it.
pub fn three_blocks_topography_fixture() -> ModelFixture {
    ModelFixture {
        title: "Three blocks topography",
        origin: (GEO_ORIGIN_X, GEO_ORIGIN_Y),
        y_azimuth: 0.0,
        dims: (300_000.0, 300_000.0, 25_000.0),
        resolution: 30_000.0,
        values: vec![("one", "m/s"), ("two", "m/s")],
        top_surface: true,
        topo_bathy: true,
        variable_surface_coords: true,
        blocks: vec![
            BlockFixture {
                name: "top",
                resolution: 30_000.0,
                z_top: 0.0,
                z_resolution: 500.0,
                nz: 11,
                variable_z: false,
            },
            BlockFixture {
                name: "middle",
                resolution: 30_000.0,
                z_top: -5_000.0,
                z_resolution: 2_500.0,
                nz: 5,
                variable_z: false,
            },
            BlockFixture {
                name: "bottom",
                resolution: 30_000.0,
                z_top: -15_000.0,
                z_resolution: 5_000.0,
                nz: 3,
                variable_z: false,
            },
        ],
    }
}

pub fn write_one_block_flat(path: &Path) -> Result<(), Box<dyn Error>> {
    write_model(path, &one_block_flat_fixture())
}

pub fn write_three_blocks_flat(path: &Path) -> Result<(), Box<dyn Error>> {
    write_model(path, &three_blocks_flat_fixture())
}

pub fn write_three_blocks_topography(path: &Path) -> Result<(), Box<dyn Error>> {
    write_model(path, &three_blocks_topography_fixture())
}

/// One-block model rotated by `y_azimuth` degrees.
pub fn write_one_block_rotated(path: &Path, y_azimuth: f64) -> Result<(), Box<dyn Error>> {
    let mut fixture = one_block_flat_fixture();
    fixture.title = "One block rotated";
    fixture.y_azimuth = y_azimuth;
    write_model(path, &fixture)
}

/// One-block model that only stores the value "one".
pub fn write_one_value_model(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut fixture = one_block_flat_fixture();
    fixture.title = "One value";
    fixture.values = vec![("one", "m/s")];
    write_model(path, &fixture)
}

/// One-block model whose value "one" carries different units than the
/// other fixtures.
pub fn write_inconsistent_units_model(path: &Path) -> Result<(), Box<dyn Error>> {
    let mut fixture = one_block_flat_fixture();
    fixture.title = "Inconsistent units";
    fixture.values = vec![("one", "km/s"), ("two", "m/s")];
    write_model(path, &fixture)
}

/// Analytic value by name at a physical point.
fn sample_value(name: &str, x: f64, y: f64, z: f64) -> f64 {
    match name {
        "one" => value_one(x, y, z),
        "two" => value_two(x, y, z),
        other => panic!("fixture has no analytic field for value '{other}'"),
    }
}

/// Write a model container for `fixture`.
pub fn write_model(path: &Path, fixture: &ModelFixture) -> Result<(), Box<dyn Error>> {
    let mut file = netcdf::create(path)?;

    file.add_attribute("title", fixture.title)?;
    file.add_attribute("id", "earthgrids-testdata")?;
    file.add_attribute("description", "Synthetic model with analytic value fields")?;
    file.add_attribute(
        "keywords",
        AttributeValue::Strs(vec!["synthetic".into(), "test".into()]),
    )?;
    file.add_attribute("history", "generated by earthgrids-model testdata")?;
    file.add_attribute("comment", "values are linear in x, y, and elevation")?;
    file.add_attribute("creator_name", "earthgrids developers")?;
    file.add_attribute("creator_email", "dev@earthgrids.invalid")?;
    file.add_attribute("creator_institution", "earthgrids")?;
    file.add_attribute("acknowledgement", "none")?;
    file.add_attribute("authors", AttributeValue::Strs(vec!["earthgrids".into()]))?;
    file.add_attribute(
        "references",
        AttributeValue::Strs(vec!["https://earthgrids.invalid/testdata".into()]),
    )?;
    file.add_attribute("repository_name", "earthgrids")?;
    file.add_attribute("repository_url", "https://github.com/yourorg/earthgrids")?;
    file.add_attribute("repository_doi", "none")?;
    file.add_attribute("version", "1.0.0")?;
    file.add_attribute("license", "MIT")?;
    file.add_attribute("auxiliary", r#"{"synthetic": true}"#)?;

    let names: Vec<String> = fixture.values.iter().map(|(n, _)| n.to_string()).collect();
    let units: Vec<String> = fixture.values.iter().map(|(_, u)| u.to_string()).collect();
    file.add_attribute("data_values", AttributeValue::Strs(names))?;
    file.add_attribute("data_units", AttributeValue::Strs(units))?;
    file.add_attribute("data_layout", "vertex")?;

    file.add_attribute("crs", MODEL_CRS)?;
    file.add_attribute("origin_x", fixture.origin.0)?;
    file.add_attribute("origin_y", fixture.origin.1)?;
    file.add_attribute("y_azimuth", fixture.y_azimuth)?;
    file.add_attribute("dim_x", fixture.dims.0)?;
    file.add_attribute("dim_y", fixture.dims.1)?;
    file.add_attribute("dim_z", fixture.dims.2)?;

    if fixture.top_surface || fixture.topo_bathy {
        let mut surfaces = file.add_group("surfaces")?;
        if fixture.top_surface {
            write_surface(&mut surfaces, "top_surface", fixture, false, top_elevation)?;
        }
        if fixture.topo_bathy {
            write_surface(
                &mut surfaces,
                "topography_bathymetry",
                fixture,
                fixture.variable_surface_coords,
                topobathy_elevation,
            )?;
        }
    }

    let mut blocks = file.add_group("blocks")?;
    for block in &fixture.blocks {
        write_block(&mut blocks, block, fixture)?;
    }
    Ok(())
}

fn write_surface(
    group: &mut netcdf::GroupMut,
    name: &str,
    fixture: &ModelFixture,
    variable_coords: bool,
    elevation: fn(f64, f64) -> f64,
) -> Result<(), Box<dyn Error>> {
    let nx = (fixture.dims.0 / fixture.resolution) as usize + 1;
    let ny = (fixture.dims.1 / fixture.resolution) as usize + 1;

    let dim_x = format!("{name}_x");
    let dim_y = format!("{name}_y");
    let dim_d = format!("{name}_d");
    group.add_dimension(&dim_x, nx)?;
    group.add_dimension(&dim_y, ny)?;
    group.add_dimension(&dim_d, 1)?;

    let mut var = group.add_variable::<f64>(name, &[&dim_x, &dim_y, &dim_d])?;
    let data: Vec<f64> = (0..nx)
        .flat_map(|i| {
            (0..ny).map(move |j| {
                elevation(i as f64 * fixture.resolution, j as f64 * fixture.resolution)
            })
        })
        .collect();
    var.put_values(&data, ..)?;

    if variable_coords {
        let coords = |n: usize| {
            (0..n)
                .map(|i| i as f64 * fixture.resolution)
                .collect::<Vec<f64>>()
        };
        var.put_attribute("x_coordinates", AttributeValue::Doubles(coords(nx)))?;
        var.put_attribute("y_coordinates", AttributeValue::Doubles(coords(ny)))?;
    } else {
        var.put_attribute("resolution_x", fixture.resolution)?;
        var.put_attribute("resolution_y", fixture.resolution)?;
    }
    Ok(())
}

fn write_block(
    group: &mut netcdf::GroupMut,
    block: &BlockFixture,
    fixture: &ModelFixture,
) -> Result<(), Box<dyn Error>> {
    let nx = (fixture.dims.0 / block.resolution) as usize + 1;
    let ny = (fixture.dims.1 / block.resolution) as usize + 1;
    let nz = block.nz;
    let nv = fixture.values.len();

    let dim_x = format!("{}_x", block.name);
    let dim_y = format!("{}_y", block.name);
    let dim_z = format!("{}_z", block.name);
    let dim_v = format!("{}_v", block.name);
    group.add_dimension(&dim_x, nx)?;
    group.add_dimension(&dim_y, ny)?;
    group.add_dimension(&dim_z, nz)?;
    group.add_dimension(&dim_v, nv)?;

    let mut var = group.add_variable::<f64>(block.name, &[&dim_x, &dim_y, &dim_z, &dim_v])?;

    // Values are sampled at the physical elevation of each node: with a top
    // surface, model elevation zm maps to S + zm * (S + Lz) / Lz.
    let depth = fixture.dims.2;
    let mut data = Vec::with_capacity(nx * ny * nz * nv);
    for i in 0..nx {
        for j in 0..ny {
            let x = i as f64 * block.resolution;
            let y = j as f64 * block.resolution;
            let surface = if fixture.top_surface {
                top_elevation(x, y)
            } else {
                0.0
            };
            for k in 0..nz {
                let zm = block.z_top - k as f64 * block.z_resolution;
                let z = surface + zm * (surface + depth) / depth;
                for (name, _) in &fixture.values {
                    data.push(sample_value(name, x, y, z));
                }
            }
        }
    }
    var.put_values(&data, ..)?;

    var.put_attribute("x_resolution", block.resolution)?;
    var.put_attribute("y_resolution", block.resolution)?;
    if block.variable_z {
        let coords: Vec<f64> = (0..nz)
            .map(|k| block.z_top - k as f64 * block.z_resolution)
            .collect();
        var.put_attribute("z_coordinates", AttributeValue::Doubles(coords))?;
    } else {
        var.put_attribute("z_resolution", block.z_resolution)?;
        var.put_attribute("z_top", block.z_top)?;
    }
    Ok(())
}
