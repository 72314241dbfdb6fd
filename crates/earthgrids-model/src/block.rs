//! Rectilinear 3-D data regions.
//!
//! A block is one (Nx, Ny, Nz, Nv) dataset under `blocks/`: a rectilinear
//! grid spanning the model footprint horizontally and a slice of the model's
//! depth vertically, with Nv values per grid node. The x and y axes ascend
//! from the model origin; the z axis is stored top-first (descending
//! elevation), and queries index it by depth below the block top.

use earthgrids_store::ModelStore;
use earthgrids_utils::{Indexing, SortOrder};

use crate::error::{ModelError, ModelResult};
use crate::hyperslab::VolumeSlab;

/// Default paging slab, in grid nodes; zero selects the full dataset extent
/// on that axis.
pub const DEFAULT_SLAB_DIMS: [usize; 4] = [64, 64, 0, 0];

/// One rectilinear region of a model.
#[derive(Debug)]
pub struct Block {
    name: String,
    location: String,
    dims: [usize; 3],
    num_values: usize,
    z_top: f64,
    indexing_x: Indexing,
    indexing_y: Indexing,
    indexing_z: Indexing,
    slab_dims: [usize; 4],
    slab: Option<VolumeSlab>,
    values: Vec<f64>,
}

impl Block {
    /// Read the block metadata for `blocks/<name>`.
    pub fn load_metadata(store: &ModelStore, name: &str) -> ModelResult<Self> {
        let location = format!("blocks/{name}");

        let dims_all = store.dataset_dims(&location)?;
        if dims_all.len() != 4 {
            return Err(ModelError::bad_metadata(
                &location,
                format!("expected an (Nx, Ny, Nz, Nv) dataset, found {dims_all:?}"),
            ));
        }
        let dims = [dims_all[0], dims_all[1], dims_all[2]];
        let num_values = dims_all[3];

        let indexing_x = horizontal_indexing(store, &location, "x", dims[0])?;
        let indexing_y = horizontal_indexing(store, &location, "y", dims[1])?;
        let (indexing_z, z_top) = vertical_indexing(store, &location, dims[2])?;

        Ok(Self {
            name: name.to_string(),
            location,
            dims,
            num_values,
            z_top,
            indexing_x,
            indexing_y,
            indexing_z,
            slab_dims: DEFAULT_SLAB_DIMS,
            slab: None,
            values: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid dimensions (Nx, Ny, Nz).
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of values stored at each grid node.
    pub fn num_values(&self) -> usize {
        self.num_values
    }

    /// Elevation of the block top in model coordinates.
    pub fn z_top(&self) -> f64 {
        self.z_top
    }

    /// Elevation of the block bottom in model coordinates.
    pub fn z_bottom(&self) -> f64 {
        match &self.indexing_z {
            Indexing::Uniform { step } => self.z_top - step * (self.dims[2] - 1) as f64,
            Indexing::Variable { coords, .. } => coords.last().copied().unwrap_or(self.z_top),
        }
    }

    /// True when elevation `z` lies within this block's vertical span.
    pub fn contains_elevation(&self, z: f64) -> bool {
        z <= self.z_top && z >= self.z_bottom()
    }

    /// Override the paging slab size for the spatial axes; zero selects the
    /// full dataset extent on that axis.
    pub fn set_slab_dims(&mut self, dims: [usize; 3]) {
        self.slab_dims = [dims[0], dims[1], dims[2], 0];
    }

    /// Allocate the paging slab and scratch value buffer for a query phase.
    pub fn open_query(&mut self, store: &ModelStore) -> ModelResult<()> {
        self.slab = Some(VolumeSlab::new(store, &self.location, self.slab_dims)?);
        self.values = vec![0.0; self.num_values];
        Ok(())
    }

    /// Release the paging slab and scratch buffer.
    pub fn close_query(&mut self) {
        self.slab = None;
        self.values = Vec::new();
    }

    /// Values at (x, y, z) in model coordinates by trilinear interpolation.
    ///
    /// The returned slice is the block's scratch buffer of length Nv and is
    /// valid until the next query.
    pub fn query(&mut self, store: &ModelStore, x: f64, y: f64, z: f64) -> ModelResult<&[f64]> {
        let index = self.grid_index(x, y, z);
        let slab = self
            .slab
            .as_mut()
            .ok_or_else(|| ModelError::QueryNotOpen(self.name.clone()))?;
        slab.interpolate(store, index, &mut self.values)?;
        Ok(&self.values)
    }

    /// Values at the grid node nearest to (x, y, z); serves categorical
    /// fields and no-data-dominated regions.
    pub fn query_nearest(
        &mut self,
        store: &ModelStore,
        x: f64,
        y: f64,
        z: f64,
    ) -> ModelResult<&[f64]> {
        let index = self.grid_index(x, y, z);
        let slab = self
            .slab
            .as_mut()
            .ok_or_else(|| ModelError::QueryNotOpen(self.name.clone()))?;
        slab.nearest(store, index, &mut self.values)?;
        Ok(&self.values)
    }

    fn grid_index(&self, x: f64, y: f64, z: f64) -> [f64; 3] {
        [
            self.indexing_x.index_of(x),
            self.indexing_y.index_of(y),
            // The z axis is stored top-first; index by depth below the top.
            self.indexing_z.index_of(self.z_top - z),
        ]
    }
}

/// Build the indexer for a horizontal block axis from `<axis>_resolution` or
/// `<axis>_coordinates`.
fn horizontal_indexing(
    store: &ModelStore,
    location: &str,
    axis: &str,
    expected_len: usize,
) -> ModelResult<Indexing> {
    let resolution_attr = format!("{axis}_resolution");
    let coordinates_attr = format!("{axis}_coordinates");

    if store.has_attribute(location, &resolution_attr) {
        let step = store.f64_attribute(location, &resolution_attr)?;
        Ok(Indexing::uniform(step)?)
    } else if store.has_attribute(location, &coordinates_attr) {
        let coords = check_coordinate_len(store, location, &coordinates_attr, axis, expected_len)?;
        Ok(Indexing::variable(&coords, SortOrder::Ascending)?)
    } else {
        Err(ModelError::bad_metadata(
            location,
            format!("missing {resolution_attr} or {coordinates_attr}"),
        ))
    }
}

/// Build the vertical indexer and block-top elevation. A uniform z axis
/// requires the `z_top` attribute; explicit z coordinates are stored
/// descending and the first (largest) coordinate is the top.
fn vertical_indexing(
    store: &ModelStore,
    location: &str,
    expected_len: usize,
) -> ModelResult<(Indexing, f64)> {
    if store.has_attribute(location, "z_resolution") {
        if !store.has_attribute(location, "z_top") {
            return Err(ModelError::bad_metadata(
                location,
                "missing z_top for uniform z resolution",
            ));
        }
        let step = store.f64_attribute(location, "z_resolution")?;
        let z_top = store.f64_attribute(location, "z_top")?;
        Ok((Indexing::uniform(step)?, z_top))
    } else if store.has_attribute(location, "z_coordinates") {
        let coords = check_coordinate_len(store, location, "z_coordinates", "z", expected_len)?;
        let z_top = coords.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok((Indexing::variable(&coords, SortOrder::Descending)?, z_top))
    } else {
        Err(ModelError::bad_metadata(
            location,
            "missing z_resolution or z_coordinates",
        ))
    }
}

fn check_coordinate_len(
    store: &ModelStore,
    location: &str,
    attribute: &str,
    axis: &str,
    expected_len: usize,
) -> ModelResult<Vec<f64>> {
    let coords = store.f64_vec_attribute(location, attribute)?;
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
    Ok(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use earthgrids_store::OpenMode;
    use netcdf::AttributeValue;
    use std::path::Path;

    /// Linear field exactly reproduced by trilinear interpolation.
    fn field(x: f64, y: f64, z: f64) -> f64 {
        2000.0 + 1.0 * x + 0.4 * y - 0.5 * z
    }

    const NX: usize = 4;
    const NY: usize = 4;
    const NZ: usize = 3;
    const DX: f64 = 10_000.0;
    const DZ: f64 = 1000.0;
    const Z_TOP: f64 = 0.0;

    fn write_block(path: &Path, variable_z: bool) {
        let mut file = netcdf::create(path).unwrap();
        let mut group = file.add_group("blocks").unwrap();
        group.add_dimension("x", NX).unwrap();
        group.add_dimension("y", NY).unwrap();
        group.add_dimension("z", NZ).unwrap();
        group.add_dimension("v", 2).unwrap();
        let mut var = group
            .add_variable::<f64>("crust", &["x", "y", "z", "v"])
            .unwrap();

        let mut data = Vec::new();
        for i in 0..NX {
            for j in 0..NY {
                for k in 0..NZ {
                    let (x, y, z) = (i as f64 * DX, j as f64 * DX, Z_TOP - k as f64 * DZ);
                    data.push(field(x, y, z));
                    data.push(-field(x, y, z));
                }
            }
        }
        var.put_values(&data, ..).unwrap();

        var.put_attribute("x_resolution", DX).unwrap();
        var.put_attribute("y_resolution", DX).unwrap();
        if variable_z {
            let coords: Vec<f64> = (0..NZ).map(|k| Z_TOP - k as f64 * DZ).collect();
            var.put_attribute("z_coordinates", AttributeValue::Doubles(coords))
                .unwrap();
        } else {
            var.put_attribute("z_resolution", DZ).unwrap();
            var.put_attribute("z_top", Z_TOP).unwrap();
        }
    }

    fn load(path: &Path) -> (ModelStore, Block) {
        let store = ModelStore::open(path, OpenMode::Read).unwrap();
        let mut block = Block::load_metadata(&store, "crust").unwrap();
        block.open_query(&store).unwrap();
        (store, block)
    }

    #[test]
    fn test_metadata_uniform_z() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let (_, block) = load(&path);

        assert_eq!(block.name(), "crust");
        assert_eq!(block.dims(), [NX, NY, NZ]);
        assert_eq!(block.num_values(), 2);
        assert_eq!(block.z_top(), Z_TOP);
        assert_eq!(block.z_bottom(), Z_TOP - DZ * (NZ - 1) as f64);
    }

    #[test]
    fn test_metadata_variable_z() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, true);
        let (_, block) = load(&path);

        assert_eq!(block.z_top(), Z_TOP);
        assert_eq!(block.z_bottom(), -2000.0);
    }

    #[test]
    fn test_contains_elevation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let (_, block) = load(&path);

        assert!(block.contains_elevation(0.0));
        assert!(block.contains_elevation(-1234.5));
        assert!(block.contains_elevation(-2000.0));
        assert!(!block.contains_elevation(0.1));
        assert!(!block.contains_elevation(-2000.1));
    }

    #[test]
    fn test_query_matches_linear_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let (store, mut block) = load(&path);

        for (x, y, z) in [
            (0.0, 0.0, 0.0),
            (18_100.0, 8_300.0, -10.0),
            (30_000.0, 30_000.0, -2000.0),
        ] {
            let values = block.query(&store, x, y, z).unwrap();
            assert!((values[0] - field(x, y, z)).abs() / field(x, y, z).abs() < 1.0e-12);
            assert!((values[1] + field(x, y, z)).abs() / field(x, y, z).abs() < 1.0e-12);
        }
    }

    #[test]
    fn test_query_variable_z_between_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, true);
        let (store, mut block) = load(&path);

        let values = block.query(&store, 5_000.0, 5_000.0, -750.0).unwrap();
        assert!((values[0] - field(5_000.0, 5_000.0, -750.0)).abs() < 1.0e-6);
    }

    #[test]
    fn test_small_slab_repages_across_the_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let store = ModelStore::open(&path, OpenMode::Read).unwrap();
        let mut block = Block::load_metadata(&store, "crust").unwrap();
        block.set_slab_dims([2, 2, 0]);
        block.open_query(&store).unwrap();

        // Opposite corners cannot share a 2x2 slab, so the second query
        // forces a re-centered read; both still match the analytic field.
        let first = block.query(&store, 0.0, 0.0, 0.0).unwrap()[0];
        assert!((first - field(0.0, 0.0, 0.0)).abs() < 1.0e-9);
        let far = block.query(&store, 30_000.0, 30_000.0, -2000.0).unwrap()[0];
        assert!((far - field(30_000.0, 30_000.0, -2000.0)).abs() < 1.0e-9);
        let back = block.query(&store, 0.0, 0.0, 0.0).unwrap()[0];
        assert_eq!(back, first);
    }

    #[test]
    fn test_query_nearest_snaps_to_node() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let (store, mut block) = load(&path);

        let values = block.query_nearest(&store, 10_900.0, 100.0, -450.0).unwrap();
        // Nearest node is (1, 0, 0).
        assert_eq!(values[0], field(DX, 0.0, 0.0));
    }

    #[test]
    fn test_query_before_open_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        write_block(&path, false);
        let store = ModelStore::open(&path, OpenMode::Read).unwrap();
        let mut block = Block::load_metadata(&store, "crust").unwrap();

        assert!(matches!(
            block.query(&store, 0.0, 0.0, 0.0),
            Err(ModelError::QueryNotOpen(_))
        ));
    }

    #[test]
    fn test_missing_z_top_for_uniform_z() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.h5");
        {
            let mut file = netcdf::create(&path).unwrap();
            let mut group = file.add_group("blocks").unwrap();
            group.add_dimension("x", 2).unwrap();
            group.add_dimension("y", 2).unwrap();
            group.add_dimension("z", 2).unwrap();
            group.add_dimension("v", 1).unwrap();
            let mut var = group
                .add_variable::<f64>("crust", &["x", "y", "z", "v"])
                .unwrap();
            var.put_values(&vec![0.0; 8], ..).unwrap();
            var.put_attribute("x_resolution", 10.0).unwrap();
            var.put_attribute("y_resolution", 10.0).unwrap();
            var.put_attribute("z_resolution", 10.0).unwrap();
        }
        let store = ModelStore::open(&path, OpenMode::Read).unwrap();
        assert!(matches!(
            Block::load_metadata(&store, "crust"),
            Err(ModelError::BadMetadata { .. })
        ));
    }
}
