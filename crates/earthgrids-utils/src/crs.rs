//! Coordinate reference system transforms built on PROJ.
//!
//! Input points arrive in an arbitrary CRS (EPSG code, WKT, or proj string)
//! and must land in a model's CRS, in the axis order each CRS declares. PROJ
//! pipelines created by the `proj` crate are normalized to (x, y)/(lon, lat)
//! order, so transforms to or from a latitude-first geographic CRS swap the
//! horizontal coordinates at the boundary to preserve the declared order.
//!
//! Per-point failures are not errors: unrepresentable points come back as
//! infinities and surface later as "point outside domain".

use proj::Proj;
use thiserror::Error;
use tracing::debug;

/// Errors raised while compiling a CRS transform.
#[derive(Debug, Error)]
pub enum CrsError {
    #[error("failed to create CRS transform from '{src}' to '{dst}': {reason}")]
    Create {
        src: String,
        dst: String,
        reason: String,
    },
}

enum Pipeline {
    /// Compiled PROJ pipelines, one per direction.
    Proj {
        forward: Proj,
        inverse: Proj,
        src_latlon: bool,
        dst_latlon: bool,
    },
    /// Swap (lat, lon) input to (x, y) = (lon, lat).
    AxisSwap,
    Identity,
}

/// Transform between a source and destination CRS.
pub struct CrsTransformer {
    src: String,
    dst: String,
    pipeline: Pipeline,
}

impl CrsTransformer {
    /// Compile transforms between `src` and `dst` (EPSG code, WKT, or proj
    /// string). Fails when either CRS is not recognized.
    pub fn new(src: &str, dst: &str) -> Result<Self, CrsError> {
        let create = |from: &str, to: &str| {
            Proj::new_known_crs(from, to, None).map_err(|err| CrsError::Create {
                src: from.to_string(),
                dst: to.to_string(),
                reason: err.to_string(),
            })
        };
        let forward = create(src, dst)?;
        let inverse = create(dst, src)?;

        Ok(Self {
            src: src.to_string(),
            dst: dst.to_string(),
            pipeline: Pipeline::Proj {
                forward,
                inverse,
                src_latlon: is_latlon_axis_order(src),
                dst_latlon: is_latlon_axis_order(dst),
            },
        })
    }

    /// Transformer from `crs` to itself with the axis order forced to
    /// (x, y); normalizes bounding boxes supplied in latitude/longitude
    /// order. Identity for CRS already in (x, y) order.
    pub fn geo_to_xy_axis_order(crs: &str) -> Result<Self, CrsError> {
        let pipeline = if is_latlon_axis_order(crs) {
            Pipeline::AxisSwap
        } else {
            Pipeline::Identity
        };
        Ok(Self {
            src: crs.to_string(),
            dst: crs.to_string(),
            pipeline,
        })
    }

    pub fn src_crs(&self) -> &str {
        &self.src
    }

    pub fn dst_crs(&self) -> &str {
        &self.dst
    }

    /// Transform a point from the source CRS to the destination CRS.
    ///
    /// `z` passes through untouched (`None` means "ignore"). Points the
    /// pipeline cannot represent come back as infinities.
    pub fn transform(&self, x: f64, y: f64, z: Option<f64>) -> (f64, f64, Option<f64>) {
        match &self.pipeline {
            Pipeline::Proj {
                forward,
                src_latlon,
                dst_latlon,
                ..
            } => {
                let (xt, yt) = project(forward, x, y, *src_latlon, *dst_latlon);
                (xt, yt, z)
            }
            Pipeline::AxisSwap => (y, x, z),
            Pipeline::Identity => (x, y, z),
        }
    }

    /// Transform a point from the destination CRS back to the source CRS.
    pub fn inverse_transform(&self, x: f64, y: f64, z: Option<f64>) -> (f64, f64, Option<f64>) {
        match &self.pipeline {
            Pipeline::Proj {
                inverse,
                src_latlon,
                dst_latlon,
                ..
            } => {
                let (xt, yt) = project(inverse, x, y, *dst_latlon, *src_latlon);
                (xt, yt, z)
            }
            Pipeline::AxisSwap => (y, x, z),
            Pipeline::Identity => (x, y, z),
        }
    }
}

fn project(pipeline: &Proj, x: f64, y: f64, in_latlon: bool, out_latlon: bool) -> (f64, f64) {
    let input = if in_latlon { (y, x) } else { (x, y) };
    match pipeline.convert(input) {
        Ok((xt, yt)) => {
            if out_latlon {
                (yt, xt)
            } else {
                (xt, yt)
            }
        }
        Err(err) => {
            debug!(x, y, error = %err, "point is not representable in target CRS");
            (f64::INFINITY, f64::INFINITY)
        }
    }
}

/// Textual unit names for the (x, y, z) axes of `crs`.
///
/// The z unit is reported as "meter (assumed)"; vertical units are not
/// recorded in the CRS strings models carry.
pub fn crs_units(crs: &str) -> (String, String, String) {
    let horizontal = if is_latlon_axis_order(crs) || is_lonlat_proj_string(crs) {
        "degree"
    } else {
        "meter"
    };
    (
        horizontal.to_string(),
        horizontal.to_string(),
        "meter (assumed)".to_string(),
    )
}

/// Geographic EPSG codes that declare latitude before longitude.
const LATLON_EPSG: &[&str] = &[
    "EPSG:4326",
    "EPSG:4267",
    "EPSG:4269",
    "EPSG:4258",
    "EPSG:4283",
    "EPSG:4617",
];

/// True when `crs` declares latitude-first axis order.
///
/// The `proj` crate does not expose PROJ's axis introspection, so this is
/// derived from the CRS string: a geographic EPSG allowlist plus a WKT
/// sniff for a geographic CRS whose first axis is latitude.
fn is_latlon_axis_order(crs: &str) -> bool {
    let normalized = crs.trim().to_uppercase();
    if LATLON_EPSG.contains(&normalized.as_str()) {
        return true;
    }
    if normalized.starts_with("GEOGCS") || normalized.starts_with("GEOGCRS") {
        if let Some(axis) = normalized.find("AXIS[") {
            return normalized[axis..].find("LAT").is_some_and(|lat| {
                normalized[axis..]
                    .find("LON")
                    .is_none_or(|lon| lat < lon)
            });
        }
        // EPSG-style geographic definitions without AXIS entries default to
        // latitude first.
        return true;
    }
    false
}

/// Proj strings for geographic coordinates are longitude-first.
fn is_lonlat_proj_string(crs: &str) -> bool {
    let normalized = crs.trim().to_lowercase();
    normalized.contains("+proj=longlat") || normalized.contains("+proj=latlong")
}
