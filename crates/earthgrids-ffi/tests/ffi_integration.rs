//! Exercise the C ABI end to end against a synthetic model.

use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use earthgrids_ffi::*;
use earthgrids_model::testdata::{self, ORIGIN_X, ORIGIN_Y};

fn c_strings(values: &[&str]) -> (Vec<CString>, Vec<*const c_char>) {
    let owned: Vec<CString> = values.iter().map(|v| CString::new(*v).unwrap()).collect();
    let pointers = owned.iter().map(|v| v.as_ptr()).collect();
    (owned, pointers)
}

#[test]
fn test_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.h5");
    testdata::write_one_block_flat(&model_path).unwrap();

    let query = earthgrids_query_create();
    assert!(!query.is_null());

    let (_path_owned, paths) = c_strings(&[model_path.to_str().unwrap()]);
    let (_name_owned, names) = c_strings(&["one", "two"]);
    let crs = CString::new(testdata::MODEL_CRS).unwrap();

    unsafe {
        let status = earthgrids_query_initialize(
            query,
            paths.as_ptr(),
            1,
            names.as_ptr(),
            2,
            crs.as_ptr(),
        );
        assert_eq!(status, EARTHGRIDS_STATUS_OK);

        let (xm, ym, z) = (18_100.0, 8_300.0, -10.0);
        let mut values = [0.0_f64; 2];
        let status =
            earthgrids_query_query(query, values.as_mut_ptr(), ORIGIN_X + xm, ORIGIN_Y + ym, z);
        assert_eq!(status, EARTHGRIDS_STATUS_OK);
        assert!((values[0] - testdata::value_one(xm, ym, z)).abs() < 1.0e-6);
        assert!((values[1] - testdata::value_two(xm, ym, z)).abs() < 1.0e-6);

        assert_eq!(earthgrids_query_finalize(query), EARTHGRIDS_STATUS_OK);

        let mut handle = query;
        earthgrids_query_destroy(&mut handle);
        assert!(handle.is_null());
    }
}

#[test]
fn test_outside_domain_reports_warning() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.h5");
    testdata::write_one_block_flat(&model_path).unwrap();

    let query = earthgrids_query_create();
    let (_path_owned, paths) = c_strings(&[model_path.to_str().unwrap()]);
    let (_name_owned, names) = c_strings(&["one"]);
    let crs = CString::new(testdata::MODEL_CRS).unwrap();

    unsafe {
        let status = earthgrids_query_initialize(
            query,
            paths.as_ptr(),
            1,
            names.as_ptr(),
            1,
            crs.as_ptr(),
        );
        assert_eq!(status, EARTHGRIDS_STATUS_OK);

        let mut values = [0.0_f64];
        let status = earthgrids_query_query(query, values.as_mut_ptr(), 0.0, 0.0, -10.0);
        assert_eq!(status, EARTHGRIDS_STATUS_WARNING);
        assert_eq!(values[0], EARTHGRIDS_NODATA_VALUE);

        let handler = earthgrids_query_get_error_handler(query);
        assert_eq!(
            earthgrids_error_handler_get_status(handler),
            EARTHGRIDS_STATUS_WARNING
        );

        let mut buffer = [0_u8; 256];
        let length = earthgrids_error_handler_get_message(
            handler,
            buffer.as_mut_ptr() as *mut c_char,
            buffer.len(),
        );
        assert!(length > 0);
        let message = std::str::from_utf8(&buffer[..length.min(buffer.len() - 1)]).unwrap();
        assert!(message.contains("not in any model"));

        earthgrids_error_handler_reset(handler);
        assert_eq!(
            earthgrids_error_handler_get_status(handler),
            EARTHGRIDS_STATUS_OK
        );

        let mut handle = query;
        earthgrids_query_destroy(&mut handle);
    }
}

#[test]
fn test_initialize_failure_surfaces_message() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("model.h5");
    testdata::write_one_block_flat(&model_path).unwrap();

    let query = earthgrids_query_create();
    let (_path_owned, paths) = c_strings(&[model_path.to_str().unwrap()]);
    let (_name_owned, names) = c_strings(&["density"]);
    let crs = CString::new(testdata::MODEL_CRS).unwrap();

    unsafe {
        let status = earthgrids_query_initialize(
            query,
            paths.as_ptr(),
            1,
            names.as_ptr(),
            1,
            crs.as_ptr(),
        );
        assert_eq!(status, EARTHGRIDS_STATUS_ERROR);

        let handler = earthgrids_query_get_error_handler(query);
        let mut buffer = [0_u8; 256];
        let length = earthgrids_error_handler_get_message(
            handler,
            buffer.as_mut_ptr() as *mut c_char,
            buffer.len(),
        );
        let message = std::str::from_utf8(&buffer[..length.min(buffer.len() - 1)]).unwrap();
        assert!(message.contains("density"));

        let mut handle = query;
        earthgrids_query_destroy(&mut handle);
    }
}

#[test]
fn test_null_handles_are_safe() {
    unsafe {
        assert_eq!(
            earthgrids_query_query(ptr::null_mut(), ptr::null_mut(), 0.0, 0.0, 0.0),
            EARTHGRIDS_STATUS_ERROR
        );
        assert_eq!(
            earthgrids_query_top_elevation(ptr::null_mut(), 0.0, 0.0),
            EARTHGRIDS_NODATA_VALUE
        );
        assert!(earthgrids_query_get_error_handler(ptr::null_mut()).is_null());
        earthgrids_query_destroy(ptr::null_mut());
    }
}
