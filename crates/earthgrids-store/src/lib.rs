//! Narrow read-only adapter over NetCDF-4/HDF5 model containers.
//!
//! The query stack never touches the container library directly; everything
//! flows through [`ModelStore`], which exposes attribute reads, dataset
//! shapes, group listings, and hyperslab reads. The adapter serializes
//! access per open file handle (the underlying C library is not reentrant),
//! which matches the one-reader-per-model concurrency model of the query
//! engine.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{silence_hdf5_errors, ModelStore, OpenMode};
