//! Shared building blocks for the earthgrids crates.
//!
//! This crate holds the pieces that every layer of the query stack needs:
//! the no-data and tolerance constants, per-axis fractional indexing for
//! rectilinear grids, CRS transforms built on PROJ, and the per-query
//! error status handler surfaced through the C ABI.

pub mod constants;
pub mod crs;
pub mod errors;
pub mod indexing;

pub use constants::{is_nodata, NODATA_VALUE, TOLERANCE};
pub use crs::{crs_units, CrsError, CrsTransformer};
pub use errors::{ErrorHandler, Status};
pub use indexing::{Indexing, IndexingError, SortOrder};
