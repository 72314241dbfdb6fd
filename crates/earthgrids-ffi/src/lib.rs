//! C ABI for the earthgrids query engine.
//!
//! Handles are opaque pointers to the Rust [`Query`] and [`ErrorHandler`]
//! types; every function returns an integer status (ok=0, warning=1,
//! error=2) or a double. Strings cross the boundary as NUL-terminated UTF-8;
//! the error message is copied out into a caller-owned buffer so no
//! allocation ownership crosses the ABI.
//!
//! ```c
//! void* query = earthgrids_query_create();
//! const char* models[1] = {"seismic.h5"};
//! const char* values[2] = {"vp", "vs"};
//! earthgrids_query_initialize(query, models, 1, values, 2, "EPSG:4326");
//! double out[2];
//! earthgrids_query_query(query, out, 35.1, -117.7, -250.0);
//! earthgrids_query_finalize(query);
//! earthgrids_query_destroy(&query);
//! ```

use std::ffi::CStr;
use std::os::raw::{c_char, c_double, c_int};
use std::path::PathBuf;
use std::ptr;

use earthgrids_model::{Query, Squashing, NODATA_VALUE};
use earthgrids_utils::{ErrorHandler, Status};

/// No-data sentinel mirrored for C callers.
pub const EARTHGRIDS_NODATA_VALUE: c_double = NODATA_VALUE;

/// Squashing mode constants for [`earthgrids_query_set_squashing`].
pub const EARTHGRIDS_SQUASH_NONE: c_int = 0;
pub const EARTHGRIDS_SQUASH_TOP_SURFACE: c_int = 1;
pub const EARTHGRIDS_SQUASH_TOPOGRAPHY_BATHYMETRY: c_int = 2;

/// Status codes returned by the query functions.
pub const EARTHGRIDS_STATUS_OK: c_int = 0;
pub const EARTHGRIDS_STATUS_WARNING: c_int = 1;
pub const EARTHGRIDS_STATUS_ERROR: c_int = 2;

fn status_code(status: Status) -> c_int {
    status as c_int
}

/// Decode a NUL-terminated UTF-8 string; `None` for null or invalid input.
///
/// # Safety
///
/// `value`, when non-null, must point to a NUL-terminated string.
unsafe fn decode_str<'a>(value: *const c_char) -> Option<&'a str> {
    if value.is_null() {
        return None;
    }
    CStr::from_ptr(value).to_str().ok()
}

/// Decode an array of NUL-terminated strings.
///
/// # Safety
///
/// `values`, when non-null, must point to `len` valid string pointers.
unsafe fn decode_str_array<'a>(values: *const *const c_char, len: c_int) -> Option<Vec<&'a str>> {
    if values.is_null() || len < 0 {
        return None;
    }
    std::slice::from_raw_parts(values, len as usize)
        .iter()
        .map(|&value| decode_str(value))
        .collect()
}

/// Create a query object. Returns null only on allocation failure.
#[no_mangle]
pub extern "C" fn earthgrids_query_create() -> *mut Query {
    Box::into_raw(Box::new(Query::new()))
}

/// Destroy a query object and null out the handle.
///
/// # Safety
///
/// `handle`, when non-null, must point at a pointer previously returned by
/// [`earthgrids_query_create`] (or null).
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_destroy(handle: *mut *mut Query) {
    if handle.is_null() {
        return;
    }
    let query = *handle;
    if !query.is_null() {
        drop(Box::from_raw(query));
        *handle = ptr::null_mut();
    }
}

/// Borrow the error handler owned by the query. The pointer is valid until
/// the query is destroyed; do not free it.
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_get_error_handler(
    handle: *mut Query,
) -> *mut ErrorHandler {
    match handle.as_mut() {
        Some(query) => query.error_handler() as *mut ErrorHandler,
        None => ptr::null_mut(),
    }
}

/// Set up the query: open the models, match the requested value names, and
/// compile the CRS transforms. Returns the error handler status.
///
/// # Safety
///
/// `handle` must be a live query handle; `model_paths` and `value_names`
/// must point to the declared numbers of NUL-terminated strings;
/// `input_crs` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_initialize(
    handle: *mut Query,
    model_paths: *const *const c_char,
    num_models: c_int,
    value_names: *const *const c_char,
    num_values: c_int,
    input_crs: *const c_char,
) -> c_int {
    let Some(query) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };

    let paths = decode_str_array(model_paths, num_models);
    let names = decode_str_array(value_names, num_values);
    let crs = decode_str(input_crs);
    let (Some(paths), Some(names), Some(crs)) = (paths, names, crs) else {
        query
            .error_handler()
            .set_error("invalid argument: null or non-UTF-8 string passed to initialize");
        return EARTHGRIDS_STATUS_ERROR;
    };

    let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
    let _ = query.initialize(&paths, &names, crs);
    status_code(query.error_handler().status())
}

/// Set the minimum elevation for squashing. Returns the handler status.
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_set_squash_min_elev(
    handle: *mut Query,
    value: c_double,
) -> c_int {
    let Some(query) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    query.set_squash_min_elev(value);
    status_code(query.error_handler().status())
}

/// Set the squashing mode (one of the `EARTHGRIDS_SQUASH_*` constants).
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_set_squashing(
    handle: *mut Query,
    value: c_int,
) -> c_int {
    let Some(query) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    let squashing = match value {
        EARTHGRIDS_SQUASH_NONE => Squashing::None,
        EARTHGRIDS_SQUASH_TOP_SURFACE => Squashing::TopSurface,
        EARTHGRIDS_SQUASH_TOPOGRAPHY_BATHYMETRY => Squashing::TopographyBathymetry,
        _ => {
            query
                .error_handler()
                .set_error(format!("unknown squashing mode {value}"));
            return EARTHGRIDS_STATUS_ERROR;
        }
    };
    if let Err(err) = query.set_squashing(squashing) {
        query.error_handler().set_error(err.to_string());
        return EARTHGRIDS_STATUS_ERROR;
    }
    status_code(query.error_handler().status())
}

/// Elevation of the top surface at a point in the input CRS;
/// [`EARTHGRIDS_NODATA_VALUE`] when unavailable.
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_top_elevation(
    handle: *mut Query,
    x: c_double,
    y: c_double,
) -> c_double {
    match handle.as_mut() {
        Some(query) => query.query_top_elevation(x, y),
        None => EARTHGRIDS_NODATA_VALUE,
    }
}

/// Elevation of the topography/bathymetry surface at a point in the input
/// CRS; [`EARTHGRIDS_NODATA_VALUE`] when unavailable.
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_topobathy_elevation(
    handle: *mut Query,
    x: c_double,
    y: c_double,
) -> c_double {
    match handle.as_mut() {
        Some(query) => query.query_topobathy_elevation(x, y),
        None => EARTHGRIDS_NODATA_VALUE,
    }
}

/// Query values at a point in the input CRS. `values` must hold one double
/// per requested value. Returns ok=0, warning=1 (point outside all models,
/// values filled with no-data), or error=2.
///
/// # Safety
///
/// `handle` must be a live query handle and `values` must point to at
/// least as many doubles as value names were passed to initialize.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_query(
    handle: *mut Query,
    values: *mut c_double,
    x: c_double,
    y: c_double,
    z: c_double,
) -> c_int {
    let Some(query) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    if values.is_null() {
        query
            .error_handler()
            .set_error("invalid argument: null output buffer passed to query");
        return EARTHGRIDS_STATUS_ERROR;
    }
    let out = std::slice::from_raw_parts_mut(values, query.num_values());
    status_code(query.query(out, x, y, z))
}

/// Close the models and return the query to an uninitialized state.
///
/// # Safety
///
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_query_finalize(handle: *mut Query) -> c_int {
    let Some(query) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    query.finalize();
    status_code(query.error_handler().status())
}

/// Status of an error handler (ok=0, warning=1, error=2).
///
/// # Safety
///
/// `handle` must be a pointer obtained from
/// [`earthgrids_query_get_error_handler`].
#[no_mangle]
pub unsafe extern "C" fn earthgrids_error_handler_get_status(
    handle: *mut ErrorHandler,
) -> c_int {
    match handle.as_ref() {
        Some(handler) => status_code(handler.status()),
        None => EARTHGRIDS_STATUS_ERROR,
    }
}

/// Copy the most recent message into `buffer` (NUL-terminated, truncated to
/// `capacity`). Returns the untruncated message length in bytes.
///
/// # Safety
///
/// `handle` must be a live error handler pointer and `buffer` must hold
/// `capacity` bytes.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_error_handler_get_message(
    handle: *mut ErrorHandler,
    buffer: *mut c_char,
    capacity: usize,
) -> usize {
    let Some(handler) = handle.as_ref() else {
        return 0;
    };
    let message = handler.message().as_bytes();
    if !buffer.is_null() && capacity > 0 {
        let copy_len = message.len().min(capacity - 1);
        std::ptr::copy_nonoverlapping(message.as_ptr(), buffer as *mut u8, copy_len);
        *buffer.add(copy_len) = 0;
    }
    message.len()
}

/// Clear the handler status and message.
///
/// # Safety
///
/// `handle` must be a live error handler pointer.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_error_handler_reset(handle: *mut ErrorHandler) {
    if let Some(handler) = handle.as_mut() {
        handler.reset();
    }
}

/// Route subsequent messages to a log file. Returns the handler status.
///
/// # Safety
///
/// `handle` must be a live error handler pointer and `path` a
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn earthgrids_error_handler_set_log_file(
    handle: *mut ErrorHandler,
    path: *const c_char,
) -> c_int {
    let Some(handler) = handle.as_mut() else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    let Some(path) = decode_str(path) else {
        return EARTHGRIDS_STATUS_ERROR;
    };
    match handler.set_log_file(std::path::Path::new(path)) {
        Ok(()) => status_code(handler.status()),
        Err(_) => EARTHGRIDS_STATUS_ERROR,
    }
}
