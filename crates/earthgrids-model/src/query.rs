//! Multi-model query engine.
//!
//! A query owns an ordered list of models and answers point queries by
//! consulting them in order: the first model containing the point wins.
//! Requested value names are matched case-insensitively against each model's
//! values at initialize time; a per-model index table remaps the model's
//! native value order into the caller's order at query time.
//!
//! Vertical squashing treats the caller's z as depth relative to a chosen
//! surface instead of absolute elevation: for `z > z_min`, the surface
//! elevation is added back before the model is consulted. At `z == z_min`
//! the coordinate is left untouched.

use std::path::Path;

use earthgrids_store::OpenMode;
use earthgrids_utils::{is_nodata, ErrorHandler, Status, NODATA_VALUE};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::model::Model;

/// Vertical squashing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Squashing {
    /// Caller z is absolute elevation.
    #[default]
    None,
    /// Caller z above the minimum elevation is depth relative to the top
    /// surface.
    TopSurface,
    /// Caller z above the minimum elevation is depth relative to the
    /// topography/bathymetry surface.
    TopographyBathymetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Constructed,
    Initialized,
    Finalized,
}

#[derive(Debug, Clone, Copy)]
enum SurfaceKind {
    Top,
    TopographyBathymetry,
}

/// Query engine over an ordered list of models.
pub struct Query {
    models: Vec<Model>,
    values_map: Vec<Vec<Option<usize>>>,
    value_names: Vec<String>,
    squashing: Squashing,
    squash_min_elev: f64,
    state: State,
    error_handler: ErrorHandler,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            values_map: Vec::new(),
            value_names: Vec::new(),
            squashing: Squashing::None,
            squash_min_elev: 0.0,
            state: State::Constructed,
            error_handler: ErrorHandler::new(),
        }
    }

    /// The error handler owned by this query.
    pub fn error_handler(&mut self) -> &mut ErrorHandler {
        &mut self.error_handler
    }

    /// Number of values returned per query point.
    pub fn num_values(&self) -> usize {
        self.value_names.len()
    }

    /// Requested value names, case-folded.
    pub fn value_names(&self) -> &[String] {
        &self.value_names
    }

    pub fn squashing(&self) -> Squashing {
        self.squashing
    }

    /// Set the squashing mode. When the query is initialized, every model
    /// must carry the surface the mode relies on.
    pub fn set_squashing(&mut self, squashing: Squashing) -> ModelResult<()> {
        if self.state == State::Initialized {
            check_squash_surfaces(&self.models, squashing)?;
        }
        self.squashing = squashing;
        Ok(())
    }

    /// Set the elevation above which squashing applies. Geometry at or
    /// below this elevation is not perturbed.
    pub fn set_squash_min_elev(&mut self, elevation: f64) {
        self.squash_min_elev = elevation;
    }

    /// Open the models, load their metadata, and build the per-model value
    /// index tables. Every requested value must appear in at least one
    /// model, with consistent units wherever it appears.
    pub fn initialize(
        &mut self,
        model_paths: &[impl AsRef<Path>],
        value_names: &[impl AsRef<str>],
        input_crs: &str,
    ) -> ModelResult<()> {
        let result = self.try_initialize(model_paths, value_names, input_crs);
        if let Err(err) = &result {
            self.error_handler.set_error(err.to_string());
        }
        result
    }

    fn try_initialize(
        &mut self,
        model_paths: &[impl AsRef<Path>],
        value_names: &[impl AsRef<str>],
        input_crs: &str,
    ) -> ModelResult<()> {
        if self.state == State::Initialized {
            return Err(ModelError::invalid_argument(
                "initialize called on an initialized query; call finalize first",
            ));
        }
        self.error_handler.reset();

        let requested: Vec<String> = value_names
            .iter()
            .map(|name| name.as_ref().trim().to_lowercase())
            .collect();

        let mut models = Vec::with_capacity(model_paths.len());
        let mut values_map = Vec::with_capacity(model_paths.len());
        for path in model_paths {
            let mut model = Model::open(path.as_ref(), OpenMode::Read)?;
            model.load_metadata(input_crs)?;
            model.initialize()?;
            values_map.push(model_values_map(&model, &requested));
            models.push(model);
        }

        for (index, name) in requested.iter().enumerate() {
            if values_map.iter().all(|map| map[index].is_none()) {
                return Err(ModelError::ValueNotInAnyModel(name.clone()));
            }
        }
        check_consistent_units(&models, &values_map, &requested)?;
        check_squash_surfaces(&models, self.squashing)?;

        debug!(
            models = models.len(),
            values = requested.len(),
            input_crs,
            "query initialized"
        );
        self.models = models;
        self.values_map = values_map;
        self.value_names = requested;
        self.state = State::Initialized;
        Ok(())
    }

    /// Close all models and return to a state from which `initialize` may
    /// be called again.
    pub fn finalize(&mut self) {
        for model in &mut self.models {
            model.finalize();
        }
        self.models.clear();
        self.values_map.clear();
        self.value_names.clear();
        self.state = State::Finalized;
    }

    /// Elevation of the top surface at (x, y) in the input CRS, from the
    /// first model that answers; `NODATA_VALUE` with warning status when no
    /// model does.
    pub fn query_top_elevation(&mut self, x: f64, y: f64) -> f64 {
        self.query_elevation(x, y, SurfaceKind::Top)
    }

    /// Elevation of the topography/bathymetry surface at (x, y) in the
    /// input CRS.
    pub fn query_topobathy_elevation(&mut self, x: f64, y: f64) -> f64 {
        self.query_elevation(x, y, SurfaceKind::TopographyBathymetry)
    }

    /// Query values at a point in the input CRS.
    ///
    /// `values` must hold at least one slot per requested value. Models are
    /// consulted in order; the first containing model fills the slots it
    /// can, and slots for values that model lacks are left untouched. When
    /// no model contains the point, every slot is set to `NODATA_VALUE` and
    /// the status is `Warning`.
    pub fn query(&mut self, values: &mut [f64], x: f64, y: f64, z: f64) -> Status {
        self.error_handler.reset();
        if self.state != State::Initialized {
            self.error_handler
                .set_error("query called before initialize");
            return Status::Error;
        }
        let num_values = self.value_names.len();
        if values.len() < num_values {
            self.error_handler.set_error(format!(
                "output buffer holds {} values but {} were requested",
                values.len(),
                num_values
            ));
            return Status::Error;
        }

        let squashing = self.squashing;
        let squash_min_elev = self.squash_min_elev;
        for (model, map) in self.models.iter_mut().zip(&self.values_map) {
            let z_query = match adjusted_elevation(model, squashing, squash_min_elev, x, y, z) {
                Ok(adjusted) => adjusted,
                Err(err) => {
                    self.error_handler.set_error(err.to_string());
                    return Status::Error;
                }
            };
            match model.contains(x, y, z_query) {
                Ok(false) => continue,
                Ok(true) => match model.query(x, y, z_query) {
                    Ok(native) => {
                        for (slot, native_index) in values.iter_mut().zip(map) {
                            if let Some(native_index) = native_index {
                                *slot = native[*native_index];
                            }
                        }
                        return Status::Ok;
                    }
                    // A containment tie at a tolerance edge can leave the
                    // point between blocks; fall through to the next model.
                    Err(ModelError::PointOutsideDomain { .. }) => continue,
                    Err(err) => {
                        self.error_handler.set_error(err.to_string());
                        return Status::Error;
                    }
                },
                Err(err) => {
                    self.error_handler.set_error(err.to_string());
                    return Status::Error;
                }
            }
        }

        for slot in values.iter_mut().take(num_values) {
            *slot = NODATA_VALUE;
        }
        self.error_handler
            .set_warning(format!("point ({x}, {y}, {z}) is not in any model"));
        Status::Warning
    }

    fn query_elevation(&mut self, x: f64, y: f64, surface: SurfaceKind) -> f64 {
        self.error_handler.reset();
        if self.state != State::Initialized {
            self.error_handler
                .set_error("elevation query called before initialize");
            return NODATA_VALUE;
        }

        for model in &mut self.models {
            let result = match surface {
                SurfaceKind::Top => model.query_top_elevation(x, y),
                SurfaceKind::TopographyBathymetry => model.query_topobathy_elevation(x, y),
            };
            match result {
                Ok(elevation) if !is_nodata(elevation) => return elevation,
                Ok(_) => continue,
                Err(err) => {
                    self.error_handler.set_error(err.to_string());
                    return NODATA_VALUE;
                }
            }
        }
        self.error_handler
            .set_warning(format!("point ({x}, {y}) is not in any model"));
        NODATA_VALUE
    }
}

/// Map each requested value index to the model's native value index, or
/// `None` when the model lacks the value.
fn model_values_map(model: &Model, requested: &[String]) -> Vec<Option<usize>> {
    let native: Vec<String> = model
        .value_names()
        .iter()
        .map(|name| name.trim().to_lowercase())
        .collect();
    requested
        .iter()
        .map(|name| native.iter().position(|candidate| candidate == name))
        .collect()
}

/// Fail when the same value name carries different units in two models.
fn check_consistent_units(
    models: &[Model],
    values_map: &[Vec<Option<usize>>],
    requested: &[String],
) -> ModelResult<()> {
    for (index, name) in requested.iter().enumerate() {
        let mut first_unit: Option<&str> = None;
        for (model, map) in models.iter().zip(values_map) {
            let Some(native_index) = map[index] else {
                continue;
            };
            let unit = model.value_units()[native_index].trim();
            match first_unit {
                None => first_unit = Some(unit),
                Some(first) if !first.eq_ignore_ascii_case(unit) => {
                    return Err(ModelError::InconsistentUnits {
                        value: name.clone(),
                        first: first.to_string(),
                        second: unit.to_string(),
                    });
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

/// Fail when a squash mode relies on a surface some model lacks.
fn check_squash_surfaces(models: &[Model], squashing: Squashing) -> ModelResult<()> {
    let missing = models.iter().find(|model| match squashing {
        Squashing::None => false,
        Squashing::TopSurface => !model.has_top_surface(),
        Squashing::TopographyBathymetry => !model.has_topography_bathymetry(),
    });
    match missing {
        Some(model) => Err(ModelError::invalid_argument(format!(
            "squashing requires a surface that model '{}' lacks",
            model.path().display()
        ))),
        None => Ok(()),
    }
}

/// Re-inflate a squashed z coordinate into an absolute elevation. Strictly
/// above the minimum elevation only; `z == z_min` is left untouched.
fn adjusted_elevation(
    model: &mut Model,
    squashing: Squashing,
    squash_min_elev: f64,
    x: f64,
    y: f64,
    z: f64,
) -> ModelResult<f64> {
    if squashing == Squashing::None || z <= squash_min_elev {
        return Ok(z);
    }
    let surface_elevation = match squashing {
        Squashing::TopSurface => model.query_top_elevation(x, y)?,
        Squashing::TopographyBathymetry => model.query_topobathy_elevation(x, y)?,
        Squashing::None => unreachable!("handled above"),
    };
    if is_nodata(surface_elevation) {
        Ok(z)
    } else {
        Ok(z + surface_elevation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;

    #[test]
    fn test_query_before_initialize_is_error() {
        let mut query = Query::new();
        let mut values = [0.0; 2];
        assert_eq!(query.query(&mut values, 0.0, 0.0, 0.0), Status::Error);
        assert_eq!(query.error_handler().status(), Status::Error);
    }

    #[test]
    fn test_initialize_twice_without_finalize_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        testdata::write_one_block_flat(&path).unwrap();

        let mut query = Query::new();
        query
            .initialize(&[&path], &["one"], testdata::MODEL_CRS)
            .unwrap();
        assert!(query
            .initialize(&[&path], &["one"], testdata::MODEL_CRS)
            .is_err());
    }

    #[test]
    fn test_finalize_then_initialize_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        testdata::write_one_block_flat(&path).unwrap();

        let mut query = Query::new();
        query
            .initialize(&[&path], &["one"], testdata::MODEL_CRS)
            .unwrap();
        query.finalize();
        query
            .initialize(&[&path], &["two"], testdata::MODEL_CRS)
            .unwrap();
        assert_eq!(query.value_names(), ["two"]);
    }

    #[test]
    fn test_unknown_value_fails_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        testdata::write_one_block_flat(&path).unwrap();

        let mut query = Query::new();
        let result = query.initialize(&[&path], &["density"], testdata::MODEL_CRS);
        assert!(matches!(result, Err(ModelError::ValueNotInAnyModel(_))));
        assert_eq!(query.error_handler().status(), Status::Error);
    }

    #[test]
    fn test_value_matching_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        testdata::write_one_block_flat(&path).unwrap();

        let mut query = Query::new();
        query
            .initialize(&[&path], &["TWO", "One"], testdata::MODEL_CRS)
            .unwrap();
        assert_eq!(query.value_names(), ["two", "one"]);
    }

    #[test]
    fn test_squash_mode_requires_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.h5");
        testdata::write_one_block_flat(&path).unwrap();

        let mut query = Query::new();
        query
            .initialize(&[&path], &["one"], testdata::MODEL_CRS)
            .unwrap();
        assert!(query.set_squashing(Squashing::TopSurface).is_err());
        assert!(query.set_squashing(Squashing::None).is_ok());
    }

    #[test]
    fn test_inconsistent_units_fail_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.h5");
        let second = dir.path().join("second.h5");
        testdata::write_one_block_flat(&first).unwrap();
        testdata::write_inconsistent_units_model(&second).unwrap();

        let mut query = Query::new();
        let result = query.initialize(&[&first, &second], &["one"], testdata::MODEL_CRS);
        assert!(matches!(result, Err(ModelError::InconsistentUnits { .. })));
    }
}
