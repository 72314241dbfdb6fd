//! One layered earth model.
//!
//! A model couples descriptive metadata, a CRS and local frame (origin plus
//! y-axis azimuth), optional elevation surfaces, and a stack of blocks
//! sorted by descending top elevation. Input points are projected into the
//! model CRS, translated and rotated into model-local axes, and vertically
//! stretched so the top surface maps to 0 and the model bottom to -Lz.

use std::path::Path;

use earthgrids_store::{ModelStore, OpenMode};
use earthgrids_utils::{is_nodata, CrsTransformer, NODATA_VALUE, TOLERANCE};
use serde::Serialize;
use tracing::debug;

use crate::block::Block;
use crate::error::{ModelError, ModelResult};
use crate::info::ModelInfo;
use crate::surface::Surface;

/// Name of the ground/air interface surface.
pub const TOP_SURFACE: &str = "top_surface";

/// Name of the solid/fluid interface surface.
pub const TOPOGRAPHY_BATHYMETRY: &str = "topography_bathymetry";

/// Whether values sit on grid vertices or cell centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataLayout {
    Vertex,
    Cell,
}

impl DataLayout {
    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "vertex" => Some(Self::Vertex),
            "cell" => Some(Self::Cell),
            _ => None,
        }
    }
}

/// One open model container with its metadata and query state.
pub struct Model {
    store: ModelStore,
    info: ModelInfo,
    value_names: Vec<String>,
    value_units: Vec<String>,
    crs: String,
    origin: [f64; 2],
    y_azimuth: f64,
    dims: [f64; 3],
    layout: DataLayout,
    top_surface: Option<Surface>,
    topo_bathy: Option<Surface>,
    blocks: Vec<Block>,
    transformer: Option<CrsTransformer>,
}

impl Model {
    /// Open the model container at `path` without reading metadata.
    pub fn open(path: &Path, mode: OpenMode) -> ModelResult<Self> {
        let store = ModelStore::open(path, mode)?;
        Ok(Self {
            store,
            info: ModelInfo::default(),
            value_names: Vec::new(),
            value_units: Vec::new(),
            crs: String::new(),
            origin: [0.0, 0.0],
            y_azimuth: 0.0,
            dims: [0.0, 0.0, 0.0],
            layout: DataLayout::Vertex,
            top_surface: None,
            topo_bathy: None,
            blocks: Vec::new(),
            transformer: None,
        })
    }

    /// Load the model metadata and compile the transform from `input_crs`
    /// (the CRS of caller-supplied points) to the model CRS.
    pub fn load_metadata(&mut self, input_crs: &str) -> ModelResult<()> {
        let store = &self.store;
        let container = store.path().display().to_string();

        self.info = ModelInfo::load(store)?;

        self.value_names = store.string_vec_attribute("/", "data_values")?;
        self.value_units = store.string_vec_attribute("/", "data_units")?;
        if self.value_names.len() != self.value_units.len() {
            return Err(ModelError::bad_metadata(
                &container,
                format!(
                    "{} data_values but {} data_units",
                    self.value_names.len(),
                    self.value_units.len()
                ),
            ));
        }

        let layout_tag = store.string_attribute("/", "data_layout")?;
        self.layout = DataLayout::parse(&layout_tag).ok_or_else(|| {
            ModelError::bad_metadata(
                &container,
                format!("unknown data_layout '{layout_tag}' (expected 'vertex' or 'cell')"),
            )
        })?;

        self.crs = store.string_attribute("/", "crs")?;
        self.origin = [
            store.f64_attribute("/", "origin_x")?,
            store.f64_attribute("/", "origin_y")?,
        ];
        self.y_azimuth = store.f64_attribute("/", "y_azimuth")?;
        self.dims = [
            store.f64_attribute("/", "dim_x")?,
            store.f64_attribute("/", "dim_y")?,
            store.f64_attribute("/", "dim_z")?,
        ];
        if self.dims.iter().any(|dim| *dim < 0.0) {
            return Err(ModelError::bad_metadata(
                &container,
                format!("negative model extent {:?}", self.dims),
            ));
        }

        self.top_surface = if store.has_dataset(&format!("surfaces/{TOP_SURFACE}")) {
            Some(Surface::load_metadata(store, TOP_SURFACE)?)
        } else {
            None
        };
        self.topo_bathy = if store.has_dataset(&format!("surfaces/{TOPOGRAPHY_BATHYMETRY}")) {
            Some(Surface::load_metadata(store, TOPOGRAPHY_BATHYMETRY)?)
        } else {
            None
        };

        let block_names = store.group_datasets("blocks")?;
        if block_names.is_empty() {
            return Err(ModelError::bad_metadata(&container, "no blocks"));
        }
        self.blocks = block_names
            .iter()
            .map(|name| Block::load_metadata(store, name))
            .collect::<ModelResult<Vec<_>>>()?;
        for block in &self.blocks {
            if block.num_values() != self.value_names.len() {
                return Err(ModelError::bad_metadata(
                    &container,
                    format!(
                        "block '{}' stores {} values but the model declares {}",
                        block.name(),
                        block.num_values(),
                        self.value_names.len()
                    ),
                ));
            }
        }
        // Shallowest block first; ties on a shared boundary resolve to the
        // shallower block.
        self.blocks
            .sort_by(|a, b| b.z_top().total_cmp(&a.z_top()));

        self.transformer = Some(CrsTransformer::new(input_crs, &self.crs)?);

        debug!(
            container,
            title = %self.info.title,
            blocks = self.blocks.len(),
            "loaded model metadata"
        );
        Ok(())
    }

    /// Open the query phase: allocate paging state on every surface and
    /// block.
    pub fn initialize(&mut self) -> ModelResult<()> {
        let store = &self.store;
        if let Some(surface) = self.top_surface.as_mut() {
            surface.open_query(store)?;
        }
        if let Some(surface) = self.topo_bathy.as_mut() {
            surface.open_query(store)?;
        }
        for block in &mut self.blocks {
            block.open_query(store)?;
        }
        Ok(())
    }

    /// Close the query phase and release paging state.
    pub fn finalize(&mut self) {
        if let Some(surface) = self.top_surface.as_mut() {
            surface.close_query();
        }
        if let Some(surface) = self.topo_bathy.as_mut() {
            surface.close_query();
        }
        for block in &mut self.blocks {
            block.close_query();
        }
    }

    /// Path the model container was opened from.
    pub fn path(&self) -> &Path {
        self.store.path()
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    pub fn value_units(&self) -> &[String] {
        &self.value_units
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    pub fn y_azimuth(&self) -> f64 {
        self.y_azimuth
    }

    /// Model extents (Lx, Ly, Lz) in model CRS units.
    pub fn dims(&self) -> [f64; 3] {
        self.dims
    }

    pub fn data_layout(&self) -> DataLayout {
        self.layout
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn has_top_surface(&self) -> bool {
        self.top_surface.is_some()
    }

    pub fn has_topography_bathymetry(&self) -> bool {
        self.topo_bathy.is_some()
    }

    pub fn top_surface(&self) -> Option<&Surface> {
        self.top_surface.as_ref()
    }

    pub fn topography_bathymetry(&self) -> Option<&Surface> {
        self.topo_bathy.as_ref()
    }

    /// Convert an input-CRS point to model coordinates: project into the
    /// model CRS, translate by the origin, rotate into model-local axes,
    /// and stretch z so the top surface maps to 0 and the bottom to -Lz.
    pub fn to_model_xyz(&mut self, x: f64, y: f64, z: f64) -> ModelResult<(f64, f64, f64)> {
        let (xm, ym) = self.to_model_xy(x, y)?;
        if !xm.is_finite() || !ym.is_finite() {
            return Ok((xm, ym, f64::INFINITY));
        }

        let mut top_elevation = 0.0;
        if let Some(surface) = self.top_surface.as_mut() {
            let elevation = surface.query(&self.store, xm, ym)?;
            if !is_nodata(elevation) {
                top_elevation = elevation;
            }
        }
        let z_bottom = -self.dims[2];
        let zm = z_bottom * (top_elevation - z) / (top_elevation - z_bottom);
        Ok((xm, ym, zm))
    }

    /// True when the point lies inside the model domain, within
    /// [`TOLERANCE`] of the extents.
    pub fn contains(&mut self, x: f64, y: f64, z: f64) -> ModelResult<bool> {
        let (xm, ym, zm) = self.to_model_xyz(x, y, z)?;
        Ok(xm >= -TOLERANCE
            && xm <= self.dims[0] + TOLERANCE
            && ym >= -TOLERANCE
            && ym <= self.dims[1] + TOLERANCE
            && zm >= -self.dims[2] - TOLERANCE
            && zm <= TOLERANCE)
    }

    /// Elevation of the top surface at an input-CRS location;
    /// `NODATA_VALUE` when the model has no top surface or the point is
    /// outside its footprint.
    pub fn query_top_elevation(&mut self, x: f64, y: f64) -> ModelResult<f64> {
        let (xm, ym) = self.to_model_xy(x, y)?;
        match self.top_surface.as_mut() {
            Some(surface) if xm.is_finite() && ym.is_finite() => {
                surface.query(&self.store, xm, ym)
            }
            _ => Ok(NODATA_VALUE),
        }
    }

    /// Elevation of the topography/bathymetry surface at an input-CRS
    /// location; `NODATA_VALUE` when absent or outside the footprint.
    pub fn query_topobathy_elevation(&mut self, x: f64, y: f64) -> ModelResult<f64> {
        let (xm, ym) = self.to_model_xy(x, y)?;
        match self.topo_bathy.as_mut() {
            Some(surface) if xm.is_finite() && ym.is_finite() => {
                surface.query(&self.store, xm, ym)
            }
            _ => Ok(NODATA_VALUE),
        }
    }

    /// Values at an input-CRS point. The unique block whose vertical span
    /// contains the stretched elevation answers; on a shared boundary the
    /// shallower block wins.
    pub fn query(&mut self, x: f64, y: f64, z: f64) -> ModelResult<&[f64]> {
        let (xm, ym, zm) = self.to_model_xyz(x, y, z)?;
        // Containment allows TOLERANCE slack past the extents; pull such
        // points onto the boundary so a block claims them.
        let z_bottom = -self.dims[2];
        let zm = if zm > 0.0 && zm <= TOLERANCE {
            0.0
        } else if zm < z_bottom && zm >= z_bottom - TOLERANCE {
            z_bottom
        } else {
            zm
        };
        let store = &self.store;
        let block = self
            .blocks
            .iter_mut()
            .find(|block| block.contains_elevation(zm))
            .ok_or(ModelError::PointOutsideDomain { x, y, z })?;
        block.query(store, xm, ym, zm)
    }

    fn to_model_xy(&self, x: f64, y: f64) -> ModelResult<(f64, f64)> {
        let transformer = self.transformer.as_ref().ok_or_else(|| {
            ModelError::invalid_argument("model metadata not loaded before query")
        })?;
        let (x_proj, y_proj, _) = transformer.transform(x, y, None);

        let azimuth = self.y_azimuth.to_radians();
        let (sin_az, cos_az) = azimuth.sin_cos();
        let x_rel = x_proj - self.origin[0];
        let y_rel = y_proj - self.origin[1];
        Ok((
            x_rel * cos_az - y_rel * sin_az,
            x_rel * sin_az + y_rel * cos_az,
        ))
    }
}
