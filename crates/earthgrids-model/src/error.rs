//! Error types for model loading and queries.

use earthgrids_store::StoreError;
use earthgrids_utils::CrsError;
use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while loading models or querying points.
#[derive(Error, Debug)]
pub enum ModelError {
    /// A caller-supplied argument is malformed (bad CRS, non-positive
    /// resolution, empty coordinate array, zero slab dimension).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A container attribute is missing or inconsistent with the data.
    #[error("bad metadata in '{path}': {reason}")]
    BadMetadata { path: String, reason: String },

    /// A requested value name matched no model.
    #[error("requested value '{0}' is not present in any model")]
    ValueNotInAnyModel(String),

    /// The same value name carries different units across models.
    #[error("value '{value}' has inconsistent units across models: '{first}' vs '{second}'")]
    InconsistentUnits {
        value: String,
        first: String,
        second: String,
    },

    /// The query point is not contained by any model.
    #[error("point ({x}, {y}, {z}) is not in any model")]
    PointOutsideDomain { x: f64, y: f64, z: f64 },

    /// A query was issued before the owning object opened its query phase.
    #[error("query phase not open for '{0}'")]
    QueryNotOpen(String),

    /// Container open/read failure.
    #[error(transparent)]
    Io(#[from] StoreError),

    /// CRS transform construction failure.
    #[error(transparent)]
    Crs(#[from] CrsError),
}

impl ModelError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn bad_metadata(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadMetadata {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<earthgrids_utils::IndexingError> for ModelError {
    fn from(err: earthgrids_utils::IndexingError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
