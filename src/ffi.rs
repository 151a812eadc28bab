// FFI bindings for C/C++/C#
use std::os::raw::{c_char, c_int};
use std::slice;

use crate::geometry::{BoundingPolygon, Point};
use crate::orientation::{classify, Orientation};

pub const OCRS_HORIZONTAL: c_int = 0;
pub const OCRS_VERTICAL: c_int = 1;
pub const OCRS_ROTATED: c_int = 2;

/// Classify a text region's orientation.
///
/// Returns 0 (horizontal), 1 (vertical) or 2 (rotated). Null pointers or an
/// empty polygon classify as horizontal.
///
/// # Safety
/// `xs` and `ys` must each point to `len` readable doubles.
#[no_mangle]
pub unsafe extern "C" fn ocrs_classify_polygon(xs: *const f64, ys: *const f64, len: usize) -> c_int {
    if xs.is_null() || ys.is_null() || len == 0 {
        return OCRS_HORIZONTAL;
    }

    let xs = slice::from_raw_parts(xs, len);
    let ys = slice::from_raw_parts(ys, len);
    let polygon: BoundingPolygon = xs
        .iter()
        .zip(ys)
        .map(|(&x, &y)| Point::new(x, y))
        .collect();

    match classify(&polygon) {
        Orientation::Horizontal => OCRS_HORIZONTAL,
        Orientation::Vertical => OCRS_VERTICAL,
        Orientation::Rotated => OCRS_ROTATED,
    }
}

/// Get library version
#[no_mangle]
pub extern "C" fn ocrs_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}
