//! Read-only access to NetCDF-4/HDF5 model containers.
//!
//! A model container is a hierarchical store: descriptive attributes on the
//! root, an optional `surfaces/` group, and a mandatory `blocks/` group whose
//! datasets carry per-axis grid attributes. This adapter exposes the narrow
//! operation set the query stack needs — attribute reads, dataset shape
//! queries, group listing, and single-shot hyperslab reads — and nothing
//! else. Locations are addressed as `/` for the root or `group/dataset`
//! paths, matching the container layout.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Once;

use netcdf::AttributeValue;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Access mode for [`ModelStore::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    ReadWrite,
    ReadWriteTruncate,
}

enum FileHandle {
    ReadOnly(netcdf::File),
    ReadWrite(netcdf::FileMut),
}

impl FileHandle {
    fn file(&self) -> &netcdf::File {
        match self {
            Self::ReadOnly(file) => file,
            Self::ReadWrite(file) => file,
        }
    }
}

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose diagnostics to stderr even when errors
/// are handled gracefully, e.g. when probing for optional attributes such as
/// `x_resolution` versus `x_coordinates`. Safe to call any number of times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and passing null handlers to
        // disable error output is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// One open model container.
pub struct ModelStore {
    handle: FileHandle,
    path: PathBuf,
}

impl ModelStore {
    /// Open the container at `path`.
    pub fn open(path: &Path, mode: OpenMode) -> StoreResult<Self> {
        silence_hdf5_errors();

        let open_err = |err: netcdf::Error| StoreError::Open {
            path: path.display().to_string(),
            reason: err.to_string(),
        };
        let handle = match mode {
            OpenMode::Read => FileHandle::ReadOnly(netcdf::open(path).map_err(open_err)?),
            OpenMode::ReadWrite => FileHandle::ReadWrite(netcdf::append(path).map_err(open_err)?),
            OpenMode::ReadWriteTruncate => {
                FileHandle::ReadWrite(netcdf::create(path).map_err(open_err)?)
            }
        };
        debug!(path = %path.display(), ?mode, "opened model container");

        Ok(Self {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Path the container was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when `location` (a `group/dataset` path) names a dataset.
    pub fn has_dataset(&self, location: &str) -> bool {
        self.find_variable(location).is_ok()
    }

    /// True when the attribute exists at `location` (`/` for the root).
    pub fn has_attribute(&self, location: &str, name: &str) -> bool {
        if is_root(location) {
            self.handle.file().attributes().any(|attr| attr.name() == name)
        } else {
            match self.find_variable(location) {
                Ok(var) => var.attributes().any(|attr| attr.name() == name),
                Err(_) => false,
            }
        }
    }

    /// Read a UTF-8 string attribute.
    pub fn string_attribute(&self, location: &str, name: &str) -> StoreResult<String> {
        match self.attribute_value(location, name)? {
            AttributeValue::Str(value) => Ok(value),
            _ => Err(StoreError::AttributeType {
                path: location.to_string(),
                name: name.to_string(),
                expected: "a string",
            }),
        }
    }

    /// Read a string-array attribute; a scalar string reads as one element.
    pub fn string_vec_attribute(&self, location: &str, name: &str) -> StoreResult<Vec<String>> {
        match self.attribute_value(location, name)? {
            AttributeValue::Strs(values) => Ok(values),
            AttributeValue::Str(value) => Ok(vec![value]),
            _ => Err(StoreError::AttributeType {
                path: location.to_string(),
                name: name.to_string(),
                expected: "a string array",
            }),
        }
    }

    /// Read an IEEE-754 double attribute.
    pub fn f64_attribute(&self, location: &str, name: &str) -> StoreResult<f64> {
        let value = self.attribute_value(location, name)?;
        f64::try_from(value).map_err(|_| StoreError::AttributeType {
            path: location.to_string(),
            name: name.to_string(),
            expected: "a double",
        })
    }

    /// Read a double-array attribute; a scalar reads as one element.
    pub fn f64_vec_attribute(&self, location: &str, name: &str) -> StoreResult<Vec<f64>> {
        match self.attribute_value(location, name)? {
            AttributeValue::Doubles(values) => Ok(values),
            AttributeValue::Double(value) => Ok(vec![value]),
            _ => Err(StoreError::AttributeType {
                path: location.to_string(),
                name: name.to_string(),
                expected: "a double array",
            }),
        }
    }

    /// Dimensions of the dataset at `location`, outermost first.
    pub fn dataset_dims(&self, location: &str) -> StoreResult<Vec<usize>> {
        let var = self.find_variable(location)?;
        Ok(var.dimensions().iter().map(|dim| dim.len()).collect())
    }

    /// Names of the datasets in `group`, sorted for deterministic iteration.
    pub fn group_datasets(&self, group: &str) -> StoreResult<Vec<String>> {
        let group = self
            .handle
            .file()
            .group(group)
            .map_err(|err| StoreError::read(group, err))?
            .ok_or_else(|| StoreError::MissingGroup(group.to_string()))?;
        let mut names: Vec<String> = group.variables().map(|var| var.name()).collect();
        names.sort();
        Ok(names)
    }

    /// Read a hyperslab of doubles from the dataset at `location` in one
    /// container read. `origin` and `count` must match the dataset rank.
    pub fn read_hyperslab(
        &self,
        location: &str,
        origin: &[usize],
        count: &[usize],
    ) -> StoreResult<Vec<f64>> {
        let var = self.find_variable(location)?;
        let extents: Vec<Range<usize>> = origin
            .iter()
            .zip(count)
            .map(|(&start, &len)| start..start + len)
            .collect();
        var.get_values::<f64, _>(extents.as_slice())
            .map_err(|err| StoreError::read(location, err))
    }

    fn attribute_value(&self, location: &str, name: &str) -> StoreResult<AttributeValue> {
        if is_root(location) {
            let attr = self
                .handle
                .file()
                .attribute(name)
                .ok_or_else(|| StoreError::missing_attribute("/", name))?;
            attr.value().map_err(|err| StoreError::read(name, err))
        } else {
            let var = self.find_variable(location)?;
            if !var.attributes().any(|attr| attr.name() == name) {
                return Err(StoreError::missing_attribute(location, name));
            }
            var.attribute_value(name)
                .ok_or_else(|| StoreError::missing_attribute(location, name))?
                .map_err(|err| StoreError::read(location, err))
        }
    }

    fn find_variable(&self, location: &str) -> StoreResult<netcdf::Variable<'_>> {
        let location = location.trim_start_matches('/');
        let missing = || StoreError::MissingDataset(location.to_string());
        match location.split_once('/') {
            Some((group_name, dataset)) => {
                let group = self
                    .handle
                    .file()
                    .group(group_name)
                    .map_err(|err| StoreError::read(location, err))?
                    .ok_or_else(|| StoreError::MissingGroup(group_name.to_string()))?;
                group.variable(dataset).ok_or_else(missing)
            }
            None => self.handle.file().variable(location).ok_or_else(missing),
        }
    }
}

fn is_root(location: &str) -> bool {
    location.is_empty() || location == "/"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample(path: &Path) {
        let mut file = netcdf::create(path).unwrap();
        file.add_attribute("title", "Sample container").unwrap();
        file.add_attribute("origin_x", 590_000.0).unwrap();
        file.add_attribute(
            "data_values",
            AttributeValue::Strs(vec!["one".to_string(), "two".to_string()]),
        )
        .unwrap();

        let mut blocks = file.add_group("blocks").unwrap();
        blocks.add_dimension("crust_x", 4).unwrap();
        blocks.add_dimension("crust_y", 3).unwrap();
        blocks.add_dimension("crust_z", 2).unwrap();
        blocks.add_dimension("crust_v", 1).unwrap();
        let mut var = blocks
            .add_variable::<f64>("crust", &["crust_x", "crust_y", "crust_z", "crust_v"])
            .unwrap();
        let data: Vec<f64> = (0..24).map(f64::from).collect();
        var.put_values(&data, ..).unwrap();
        var.put_attribute("x_resolution", 100.0).unwrap();
        var.put_attribute(
            "z_coordinates",
            AttributeValue::Doubles(vec![0.0, -500.0]),
        )
        .unwrap();
    }

    fn open_sample(dir: &tempfile::TempDir) -> ModelStore {
        let path = dir.path().join("sample.h5");
        write_sample(&path);
        ModelStore::open(&path, OpenMode::Read).unwrap()
    }

    #[test]
    fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelStore::open(&dir.path().join("absent.h5"), OpenMode::Read);
        assert!(matches!(result, Err(StoreError::Open { .. })));
    }

    #[test]
    fn test_root_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);

        assert_eq!(store.string_attribute("/", "title").unwrap(), "Sample container");
        assert_eq!(store.f64_attribute("/", "origin_x").unwrap(), 590_000.0);
        assert_eq!(
            store.string_vec_attribute("/", "data_values").unwrap(),
            vec!["one", "two"]
        );
        assert!(store.has_attribute("/", "title"));
        assert!(!store.has_attribute("/", "absent"));
    }

    #[test]
    fn test_missing_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);
        assert!(matches!(
            store.string_attribute("/", "absent"),
            Err(StoreError::MissingAttribute { .. })
        ));
    }

    #[test]
    fn test_attribute_type_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);
        assert!(matches!(
            store.f64_attribute("/", "title"),
            Err(StoreError::AttributeType { .. })
        ));
    }

    #[test]
    fn test_dataset_attributes_and_dims() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);

        assert!(store.has_dataset("blocks/crust"));
        assert!(!store.has_dataset("blocks/mantle"));
        assert_eq!(store.dataset_dims("blocks/crust").unwrap(), vec![4, 3, 2, 1]);
        assert_eq!(store.f64_attribute("blocks/crust", "x_resolution").unwrap(), 100.0);
        assert_eq!(
            store.f64_vec_attribute("blocks/crust", "z_coordinates").unwrap(),
            vec![0.0, -500.0]
        );
        assert!(store.has_attribute("blocks/crust", "x_resolution"));
        assert!(!store.has_attribute("blocks/crust", "y_resolution"));
    }

    #[test]
    fn test_group_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);

        assert_eq!(store.group_datasets("blocks").unwrap(), vec!["crust"]);
        assert!(matches!(
            store.group_datasets("surfaces"),
            Err(StoreError::MissingGroup(_))
        ));
    }

    #[test]
    fn test_read_hyperslab() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sample(&dir);

        // Full dataset, row-major.
        let all = store
            .read_hyperslab("blocks/crust", &[0, 0, 0, 0], &[4, 3, 2, 1])
            .unwrap();
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], 0.0);
        assert_eq!(all[23], 23.0);

        // Interior subset: x in [1, 2], y in [1, 2], all z, all v.
        let subset = store
            .read_hyperslab("blocks/crust", &[1, 1, 0, 0], &[2, 2, 2, 1])
            .unwrap();
        assert_eq!(subset.len(), 8);
        // Element (x=1, y=1, z=0) of the full grid is 1*6 + 1*2 + 0 = 8.
        assert_eq!(subset[0], 8.0);
    }
}
