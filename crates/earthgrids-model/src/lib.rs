//! Layered 3-D earth model queries.
//!
//! Models live in self-describing NetCDF-4/HDF5 containers: rectilinear
//! blocks stacked in elevation, optional elevation surfaces, and descriptive
//! metadata. A [`Query`] owns an ordered list of [`Model`]s and answers
//! point queries in an arbitrary input CRS: the point is projected into each
//! model's CRS, rotated into model-local axes, vertically stretched against
//! the top surface, dispatched to the containing block, and interpolated
//! through a paged hyperslab cache.
//!
//! ```rust,ignore
//! use earthgrids_model::{Query, Squashing};
//!
//! let mut query = Query::new();
//! query.initialize(&["seismic.h5"], &["vp", "vs"], "EPSG:4326")?;
//!
//! let mut values = [0.0; 2];
//! let status = query.query(&mut values, 35.1, -117.7, -250.0);
//! query.finalize();
//! ```

pub mod block;
pub mod error;
pub mod hyperslab;
pub mod info;
pub mod model;
pub mod query;
pub mod surface;
pub mod testdata;

pub use block::Block;
pub use earthgrids_store::OpenMode;
pub use error::{ModelError, ModelResult};
pub use info::ModelInfo;
pub use model::{DataLayout, Model, TOPOGRAPHY_BATHYMETRY, TOP_SURFACE};
pub use query::{Query, Squashing};
pub use surface::Surface;

// Re-export the shared constants and status types; callers interpreting
// query results need them.
pub use earthgrids_utils::{is_nodata, ErrorHandler, Status, NODATA_VALUE, TOLERANCE};
