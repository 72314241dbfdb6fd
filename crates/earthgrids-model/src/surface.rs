//! 2-D elevation grids.
//!
//! A surface is a single-band elevation grid in model coordinates, stored as
//! an (Nx, Ny, 1) dataset under `surfaces/`. Each axis carries either a
//! uniform resolution (`resolution_x`, `resolution_y`) or an explicit
//! coordinate vector (`x_coordinates`, `y_coordinates`). Two surfaces are
//! meaningful to a model: `top_surface` (ground/air interface) and
//! `topography_bathymetry` (solid/fluid interface).

use earthgrids_store::ModelStore;
use earthgrids_utils::{Indexing, SortOrder, NODATA_VALUE};

use crate::error::{ModelError, ModelResult};
use crate::hyperslab::SurfaceSlab;

/// Default paging slab, in grid nodes.
pub const DEFAULT_SLAB_DIMS: [usize; 2] = [128, 128];

/// One elevation grid of a model.
#[derive(Debug)]
pub struct Surface {
    name: String,
    location: String,
    dims: [usize; 2],
    indexing_x: Indexing,
    indexing_y: Indexing,
    slab_dims: [usize; 2],
    slab: Option<SurfaceSlab>,
}

impl Surface {
    /// Read the surface metadata for `surfaces/<name>`.
    pub fn load_metadata(store: &ModelStore, name: &str) -> ModelResult<Self> {
        let location = format!("surfaces/{name}");

        let dims_all = store.dataset_dims(&location)?;
        if dims_all.len() != 3 || dims_all[2] != 1 {
            return Err(ModelError::bad_metadata(
                &location,
                format!("expected an (Nx, Ny, 1) dataset, found {dims_all:?}"),
            ));
        }
        let dims = [dims_all[0], dims_all[1]];

        let indexing_x = axis_indexing(store, &location, "x", dims[0])?;
        let indexing_y = axis_indexing(store, &location, "y", dims[1])?;

        Ok(Self {
            name: name.to_string(),
            location,
            dims,
            indexing_x,
            indexing_y,
            slab_dims: DEFAULT_SLAB_DIMS,
            slab: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid dimensions (Nx, Ny).
    pub fn dims(&self) -> [usize; 2] {
        self.dims
    }

    /// Override the paging slab size, in grid nodes.
    pub fn set_slab_dims(&mut self, dims: [usize; 2]) -> ModelResult<()> {
        if dims.contains(&0) {
            return Err(ModelError::invalid_argument(format!(
                "zero hyperslab dimension {dims:?} for surface '{}'",
                self.name
            )));
        }
        self.slab_dims = dims;
        Ok(())
    }

    /// Allocate the paging slab for a query phase.
    pub fn open_query(&mut self, store: &ModelStore) -> ModelResult<()> {
        self.slab = Some(SurfaceSlab::new(store, &self.location, self.slab_dims)?);
        Ok(())
    }

    /// Release the paging slab.
    pub fn close_query(&mut self) {
        self.slab = None;
    }

    /// Elevation at (x, y) in model coordinates by bilinear interpolation;
    /// `NODATA_VALUE` when either fractional index lies outside the grid.
    pub fn query(&mut self, store: &ModelStore, x: f64, y: f64) -> ModelResult<f64> {
        match self.grid_index(x, y) {
            Some(index) => self.slab_mut()?.interpolate(store, index),
            None => Ok(NODATA_VALUE),
        }
    }

    /// Elevation at the grid node nearest to (x, y); `NODATA_VALUE` outside
    /// the grid.
    pub fn query_nearest(&mut self, store: &ModelStore, x: f64, y: f64) -> ModelResult<f64> {
        match self.grid_index(x, y) {
            Some(index) => self.slab_mut()?.nearest(store, index),
            None => Ok(NODATA_VALUE),
        }
    }

    fn grid_index(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let index = [self.indexing_x.index_of(x), self.indexing_y.index_of(y)];
        let inside = index[0] >= 0.0
            && index[0] <= (self.dims[0] - 1) as f64
            && index[1] >= 0.0
            && index[1] <= (self.dims[1] - 1) as f64;
        inside.then_some(index)
    }

    fn slab_mut(&mut self) -> ModelResult<&mut SurfaceSlab> {
        self.slab
            .as_mut()
            .ok_or_else(|| ModelError::QueryNotOpen(self.name.clone()))
    }
}

/// Build the indexer for one surface axis from `resolution_<axis>` or
/// `<axis>_coordinates`.
fn axis_indexing(
    store: &ModelStore,
    location: &str,
    axis: &str,
    expected_len: usize,
) -> ModelResult<Indexing> {
    let resolution_attr = format!("resolution_{axis}");
    let coordinates_attr = format!("{axis}_coordinates");

    if store.has_attribute(location, &resolution_attr) {
        let step = store.f64_attribute(location, &resolution_attr)?;
        Ok(Indexing::uniform(step)?)
    } else if store.has_attribute(location, &coordinates_attr) {
        let coords = store.f64_vec_attribute(location, &coordinates_attr)?;
        if coords.len() != expected_len {
            return Err(ModelError::bad_metadata(
                location,
                format!(
                    "{} axis has {} grid nodes but {} coordinates",
                    axis,
                    expected_len,
                    coords.len()
                ),
            ));
        }
        Ok(Indexing::variable(&coords, SortOrder::Ascending)?)
    } else {
        Err(ModelError::bad_metadata(
            location,
            format!("missing {resolution_attr} or {coordinates_attr}"),
        ))
    }
}
