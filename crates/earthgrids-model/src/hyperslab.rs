//! Hyperslab paging and interpolation kernels.
//!
//! Datasets are queried point by point, but read from the container a slab
//! at a time: a contiguous sub-region kept resident in memory. When a query
//! index falls outside the resident slab, the slab is re-centered on the
//! target and re-read in a single container read; a replacement slab is
//! installed only after the read succeeds, so a partially loaded slab is
//! never observable.
//!
//! Two slab shapes exist: [`SurfaceSlab`] for (Nx, Ny, 1) elevation grids and
//! [`VolumeSlab`] for (Nx, Ny, Nz, Nv) block data. The interpolation kernels
//! are plain functions over the slab state.

use earthgrids_store::ModelStore;

use crate::error::{ModelError, ModelResult};

/// Paged 2-D slab over an (Nx, Ny, 1) elevation dataset.
#[derive(Debug)]
pub struct SurfaceSlab {
    location: String,
    dims: [usize; 3],
    dims_all: [usize; 3],
    origin: Option<[usize; 3]>,
    values: Vec<f64>,
}

impl SurfaceSlab {
    /// Create a slab over the dataset at `location`, clamping the requested
    /// slab size to the dataset extent on every axis.
    pub fn new(store: &ModelStore, location: &str, slab_dims: [usize; 2]) -> ModelResult<Self> {
        if slab_dims.contains(&0) {
            return Err(ModelError::invalid_argument(format!(
                "zero hyperslab dimension {slab_dims:?} for '{location}'"
            )));
        }
        let all = store.dataset_dims(location)?;
        if all.len() != 3 {
            return Err(ModelError::bad_metadata(
                location,
                format!("expected a 3-D dataset, found rank {}", all.len()),
            ));
        }
        let dims_all = [all[0], all[1], all[2]];
        let dims = [
            slab_dims[0].min(dims_all[0]),
            slab_dims[1].min(dims_all[1]),
            dims_all[2],
        ];

        Ok(Self {
            location: location.to_string(),
            dims,
            dims_all,
            origin: None,
            values: Vec::new(),
        })
    }

    /// Bilinear interpolation at fractional index (i, j).
    pub fn interpolate(&mut self, store: &ModelStore, index: [f64; 2]) -> ModelResult<f64> {
        let origin = self.ensure_slab(store, &index)?;
        let mut out = [0.0];
        kernels::bilinear(&self.values, &self.dims, &origin, &index, &mut out);
        Ok(out[0])
    }

    /// Value at the grid node nearest to (i, j).
    pub fn nearest(&mut self, store: &ModelStore, index: [f64; 2]) -> ModelResult<f64> {
        let origin = self.ensure_slab(store, &index)?;
        let mut out = [0.0];
        kernels::nearest_2d(&self.values, &self.dims, &origin, &index, &mut out);
        Ok(out[0])
    }

    fn ensure_slab(&mut self, store: &ModelStore, index: &[f64]) -> ModelResult<[usize; 3]> {
        if let Some(origin) = self.origin {
            if slab_contains(&origin, &self.dims, index) {
                return Ok(origin);
            }
        }
        let origin = recenter(&self.dims, &self.dims_all, index);
        self.values = store.read_hyperslab(&self.location, &origin, &self.dims)?;
        self.origin = Some(origin);
        Ok(origin)
    }
}

/// Paged 3-D slab over an (Nx, Ny, Nz, Nv) block dataset.
#[derive(Debug)]
pub struct VolumeSlab {
    location: String,
    dims: [usize; 4],
    dims_all: [usize; 4],
    origin: Option<[usize; 4]>,
    values: Vec<f64>,
}

impl VolumeSlab {
    /// Create a slab over the dataset at `location`. A zero entry in
    /// `slab_dims` selects the full dataset extent on that axis; nonzero
    /// entries are clamped to the dataset extent.
    pub fn new(store: &ModelStore, location: &str, slab_dims: [usize; 4]) -> ModelResult<Self> {
        let all = store.dataset_dims(location)?;
        if all.len() != 4 {
            return Err(ModelError::bad_metadata(
                location,
                format!("expected a 4-D dataset, found rank {}", all.len()),
            ));
        }
        let dims_all = [all[0], all[1], all[2], all[3]];
        let mut dims = [0; 4];
        for k in 0..4 {
            dims[k] = if slab_dims[k] == 0 {
                dims_all[k]
            } else {
                slab_dims[k].min(dims_all[k])
            };
        }

        Ok(Self {
            location: location.to_string(),
            dims,
            dims_all,
            origin: None,
            values: Vec::new(),
        })
    }

    /// Trilinear interpolation at fractional index (i, j, k); writes one
    /// entry per value into `out`.
    pub fn interpolate(
        &mut self,
        store: &ModelStore,
        index: [f64; 3],
        out: &mut [f64],
    ) -> ModelResult<()> {
        let origin = self.ensure_slab(store, &index)?;
        kernels::trilinear(&self.values, &self.dims, &origin, &index, out);
        Ok(())
    }

    /// Values at the grid node nearest to (i, j, k).
    pub fn nearest(
        &mut self,
        store: &ModelStore,
        index: [f64; 3],
        out: &mut [f64],
    ) -> ModelResult<()> {
        let origin = self.ensure_slab(store, &index)?;
        kernels::nearest_3d(&self.values, &self.dims, &origin, &index, out);
        Ok(())
    }

    fn ensure_slab(&mut self, store: &ModelStore, index: &[f64]) -> ModelResult<[usize; 4]> {
        if let Some(origin) = self.origin {
            if slab_contains(&origin, &self.dims, index) {
                return Ok(origin);
            }
        }
        let origin = recenter(&self.dims, &self.dims_all, index);
        self.values = store.read_hyperslab(&self.location, &origin, &self.dims)?;
        self.origin = Some(origin);
        Ok(origin)
    }
}

/// True when every spatial index lies within the resident slab,
/// `index[k] ∈ [origin[k], origin[k] + dims[k] - 1]`.
fn slab_contains<const N: usize>(origin: &[usize; N], dims: &[usize; N], index: &[f64]) -> bool {
    index.iter().enumerate().all(|(k, &i)| {
        let local = i - origin[k] as f64;
        local >= 0.0 && local <= (dims[k] - 1) as f64
    })
}

/// Choose a slab origin that centers the target index, clamped so the slab
/// stays within the dataset: `clamp(floor(i - (d-1)/2), 0, D - d)` per axis.
fn recenter<const N: usize>(dims: &[usize; N], dims_all: &[usize; N], index: &[f64]) -> [usize; N] {
    let mut origin = [0usize; N];
    for (k, &i) in index.iter().enumerate() {
        let centered = (i - (dims[k] - 1) as f64 / 2.0).floor();
        let max = (dims_all[k] - dims[k]) as f64;
        origin[k] = centered.clamp(0.0, max) as usize;
    }
    origin
}

mod kernels {
    use earthgrids_utils::{is_nodata, NODATA_VALUE};

    /// Pulls an index sitting exactly on the last grid node back into the
    /// final cell instead of snapping past it.
    const EDGE_EPSILON: f64 = 1.0e-12;

    fn lower_corner(local: f64, extent: usize) -> usize {
        let floor = (local - EDGE_EPSILON).floor().max(0.0) as usize;
        floor.min(extent.saturating_sub(2))
    }

    fn nearest_node(local: f64, extent: usize) -> usize {
        (local.round().max(0.0) as usize).min(extent - 1)
    }

    /// Bilinear blend of the four cell corners around (i, j), one output per
    /// value. No-data is detected only at the single nearest corner.
    pub(super) fn bilinear(
        values: &[f64],
        dims: &[usize; 3],
        origin: &[usize; 3],
        index: &[f64; 2],
        out: &mut [f64],
    ) {
        let local = [index[0] - origin[0] as f64, index[1] - origin[1] as f64];
        let i0 = lower_corner(local[0], dims[0]);
        let j0 = lower_corner(local[1], dims[1]);
        let i1 = (i0 + 1).min(dims[0] - 1);
        let j1 = (j0 + 1).min(dims[1] - 1);
        let fx = local[0] - i0 as f64;
        let fy = local[1] - j0 as f64;

        let num_values = dims[2];
        let offset = |i: usize, j: usize| (i * dims[1] + j) * num_values;
        let corners = [
            (offset(i0, j0), (1.0 - fx) * (1.0 - fy)),
            (offset(i0, j1), (1.0 - fx) * fy),
            (offset(i1, j0), fx * (1.0 - fy)),
            (offset(i1, j1), fx * fy),
        ];
        let nearest = offset(nearest_node(local[0], dims[0]), nearest_node(local[1], dims[1]));

        for (value, slot) in out.iter_mut().enumerate().take(num_values) {
            if is_nodata(values[nearest + value]) {
                *slot = NODATA_VALUE;
                continue;
            }
            *slot = corners
                .iter()
                .map(|&(corner, weight)| weight * values[corner + value])
                .sum();
        }
    }

    /// Trilinear blend of the eight cell corners around (i, j, k). If any
    /// corner involved carries no-data, the output is no-data, not the
    /// blended result.
    pub(super) fn trilinear(
        values: &[f64],
        dims: &[usize; 4],
        origin: &[usize; 4],
        index: &[f64; 3],
        out: &mut [f64],
    ) {
        let local = [
            index[0] - origin[0] as f64,
            index[1] - origin[1] as f64,
            index[2] - origin[2] as f64,
        ];
        let i0 = lower_corner(local[0], dims[0]);
        let j0 = lower_corner(local[1], dims[1]);
        let k0 = lower_corner(local[2], dims[2]);
        let i1 = (i0 + 1).min(dims[0] - 1);
        let j1 = (j0 + 1).min(dims[1] - 1);
        let k1 = (k0 + 1).min(dims[2] - 1);
        let fx = local[0] - i0 as f64;
        let fy = local[1] - j0 as f64;
        let fz = local[2] - k0 as f64;

        let num_values = dims[3];
        let offset = |i: usize, j: usize, k: usize| ((i * dims[1] + j) * dims[2] + k) * num_values;
        let corners = [
            (offset(i0, j0, k0), (1.0 - fx) * (1.0 - fy) * (1.0 - fz)),
            (offset(i0, j0, k1), (1.0 - fx) * (1.0 - fy) * fz),
            (offset(i0, j1, k0), (1.0 - fx) * fy * (1.0 - fz)),
            (offset(i0, j1, k1), (1.0 - fx) * fy * fz),
            (offset(i1, j0, k0), fx * (1.0 - fy) * (1.0 - fz)),
            (offset(i1, j0, k1), fx * (1.0 - fy) * fz),
            (offset(i1, j1, k0), fx * fy * (1.0 - fz)),
            (offset(i1, j1, k1), fx * fy * fz),
        ];

        for value in 0..num_values {
            let mut blended = 0.0;
            let mut has_nodata = false;
            for &(corner, weight) in &corners {
                let sample = values[corner + value];
                if is_nodata(sample) {
                    has_nodata = true;
                }
                blended += weight * sample;
            }
            out[value] = if has_nodata { NODATA_VALUE } else { blended };
        }
    }

    /// Values at the node nearest to (i, j); near-sentinel samples collapse
    /// to the exact sentinel.
    pub(super) fn nearest_2d(
        values: &[f64],
        dims: &[usize; 3],
        origin: &[usize; 3],
        index: &[f64; 2],
        out: &mut [f64],
    ) {
        let local = [index[0] - origin[0] as f64, index[1] - origin[1] as f64];
        let i = nearest_node(local[0], dims[0]);
        let j = nearest_node(local[1], dims[1]);
        let num_values = dims[2];
        let offset = (i * dims[1] + j) * num_values;

        for (value, slot) in out.iter_mut().enumerate().take(num_values) {
            let sample = values[offset + value];
            *slot = if is_nodata(sample) { NODATA_VALUE } else { sample };
        }
    }

    /// Values at the node nearest to (i, j, k).
    pub(super) fn nearest_3d(
        values: &[f64],
        dims: &[usize; 4],
        origin: &[usize; 4],
        index: &[f64; 3],
        out: &mut [f64],
    ) {
        let local = [
            index[0] - origin[0] as f64,
            index[1] - origin[1] as f64,
            index[2] - origin[2] as f64,
        ];
        let i = nearest_node(local[0], dims[0]);
        let j = nearest_node(local[1], dims[1]);
        let k = nearest_node(local[2], dims[2]);
        let num_values = dims[3];
        let offset = ((i * dims[1] + j) * dims[2] + k) * num_values;

        for (value, slot) in out.iter_mut().enumerate().take(num_values) {
            let sample = values[offset + value];
            *slot = if is_nodata(sample) { NODATA_VALUE } else { sample };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use earthgrids_store::OpenMode;
    use earthgrids_utils::NODATA_VALUE;

    #[test]
    fn test_recenter_first_call() {
        // 100-node axis, 10-node slab: target 50 centers to origin 45.
        let origin = recenter(&[10, 10, 1], &[100, 100, 1], &[50.0, 0.0]);
        assert_eq!(origin, [45, 0, 0]);
    }

    #[test]
    fn test_recenter_clamps_to_dataset() {
        let origin = recenter(&[10, 10, 1], &[100, 100, 1], &[2.0, 98.0]);
        assert_eq!(origin[0], 0);
        assert_eq!(origin[1], 90);
    }

    #[test]
    fn test_recenter_full_extent_slab() {
        let origin = recenter(&[100, 1], &[100, 1], &[99.0]);
        assert_eq!(origin, [0, 0]);
    }

    #[test]
    fn test_slab_contains_bounds() {
        let origin = [40, 0, 0];
        let dims = [10, 10, 1];
        assert!(slab_contains(&origin, &dims, &[40.0, 0.0]));
        assert!(slab_contains(&origin, &dims, &[49.0, 9.0]));
        assert!(!slab_contains(&origin, &dims, &[39.9, 0.0]));
        assert!(!slab_contains(&origin, &dims, &[49.1, 0.0]));
    }

    #[test]
    fn test_bilinear_exact_at_nodes() {
        // 3x3 grid, one value per node, value = 10*i + j.
        let dims = [3, 3, 1];
        let values: Vec<f64> = (0..3)
            .flat_map(|i| (0..3).map(move |j| (10 * i + j) as f64))
            .collect();
        let mut out = [0.0];
        kernels::bilinear(&values, &dims, &[0, 0, 0], &[2.0, 1.0], &mut out);
        assert!((out[0] - 21.0).abs() < 1.0e-12);
    }

    #[test]
    fn test_bilinear_blends_linearly() {
        let dims = [2, 2, 1];
        let values = vec![0.0, 1.0, 2.0, 3.0]; // value = 2i + j
        let mut out = [0.0];
        kernels::bilinear(&values, &dims, &[0, 0, 0], &[0.5, 0.5], &mut out);
        assert!((out[0] - 1.5).abs() < 1.0e-12);
    }

    #[test]
    fn test_bilinear_nearest_corner_nodata() {
        let dims = [2, 2, 1];
        let values = vec![0.0, 1.0, 2.0, NODATA_VALUE];
        let mut out = [0.0];
        // Nearest corner to (0.9, 0.9) is (1, 1), which carries no-data.
        kernels::bilinear(&values, &dims, &[0, 0, 0], &[0.9, 0.9], &mut out);
        assert_eq!(out[0], NODATA_VALUE);
        // Nearest corner to (0.1, 0.1) is valid; the blend leaks the
        // sentinel magnitude but is reported as-is (degenerate 2-D policy).
        kernels::bilinear(&values, &dims, &[0, 0, 0], &[0.1, 0.1], &mut out);
        assert_ne!(out[0], NODATA_VALUE);
    }

    #[test]
    fn test_trilinear_exact_at_nodes() {
        // 2x2x2 grid, two values per node: v0 = 100i + 10j + k, v1 = -v0.
        let dims = [2, 2, 2, 2];
        let mut values = Vec::new();
        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    let v = (100 * i + 10 * j + k) as f64;
                    values.push(v);
                    values.push(-v);
                }
            }
        }
        let mut out = [0.0, 0.0];
        kernels::trilinear(&values, &dims, &[0, 0, 0, 0], &[1.0, 0.0, 1.0], &mut out);
        assert!((out[0] - 101.0).abs() < 1.0e-12);
        assert!((out[1] + 101.0).abs() < 1.0e-12);
    }

    #[test]
    fn test_trilinear_nodata_contagion() {
        let dims = [2, 2, 2, 1];
        let mut values = vec![1.0; 8];
        values[7] = NODATA_VALUE; // corner (1, 1, 1)
        let mut out = [0.0];
        kernels::trilinear(&values, &dims, &[0, 0, 0, 0], &[0.5, 0.5, 0.5], &mut out);
        assert_eq!(out[0], NODATA_VALUE);

        // Per-value independence: a second value without a bad corner blends.
        let dims = [2, 2, 2, 2];
        let mut values = vec![1.0; 16];
        values[14] = NODATA_VALUE; // corner (1, 1, 1), value 0
        let mut out = [0.0, 0.0];
        kernels::trilinear(&values, &dims, &[0, 0, 0, 0], &[0.5, 0.5, 0.5], &mut out);
        assert_eq!(out[0], NODATA_VALUE);
        assert!((out[1] - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn test_nearest_3d_snaps() {
        let dims = [2, 2, 2, 1];
        let values: Vec<f64> = (0..8).map(f64::from).collect();
        let mut out = [0.0];
        kernels::nearest_3d(&values, &dims, &[0, 0, 0, 0], &[0.6, 0.4, 0.9], &mut out);
        // Nearest node is (1, 0, 1) -> flat index 5.
        assert_eq!(out[0], 5.0);
    }

    fn write_surface_dataset(path: &std::path::Path, nx: usize, ny: usize) {
        let mut file = netcdf::create(path).unwrap();
        let mut group = file.add_group("surfaces").unwrap();
        group.add_dimension("x", nx).unwrap();
        group.add_dimension("y", ny).unwrap();
        group.add_dimension("d", 1).unwrap();
        let mut var = group
            .add_variable::<f64>("top_surface", &["x", "y", "d"])
            .unwrap();
        let data: Vec<f64> = (0..nx)
            .flat_map(|i| (0..ny).map(move |j| (i * 1000 + j) as f64))
            .collect();
        var.put_values(&data, ..).unwrap();
    }

    #[test]
    fn test_surface_slab_pages_and_interpolates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.h5");
        write_surface_dataset(&path, 40, 40);
        let store = ModelStore::open(&path, OpenMode::Read).unwrap();

        let mut slab = SurfaceSlab::new(&store, "surfaces/top_surface", [8, 8]).unwrap();

        // Node value = 1000*i + j everywhere, so interpolation is exact.
        let near_origin = slab.interpolate(&store, [1.5, 2.5]).unwrap();
        assert!((near_origin - 1502.5).abs() < 1.0e-9);

        // Far corner forces a re-centered slab read.
        let far = slab.interpolate(&store, [38.25, 36.5]).unwrap();
        assert!((far - 38_286.5).abs() < 1.0e-9);

        // Idempotence: the same point yields the same value from the
        // resident slab.
        let again = slab.interpolate(&store, [38.25, 36.5]).unwrap();
        assert_eq!(far, again);
    }

    #[test]
    fn test_surface_slab_rejects_zero_dims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("surface.h5");
        write_surface_dataset(&path, 4, 4);
        let store = ModelStore::open(&path, OpenMode::Read).unwrap();

        assert!(SurfaceSlab::new(&store, "surfaces/top_surface", [0, 8]).is_err());
    }
}
