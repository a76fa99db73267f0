//! Shims for `open`

use std::ffi::{c_char, c_int, c_uint};

use libc::mode_t;

use crate::trace;

/// Two-argument form of `open`
///
/// # Safety
/// `path` must point to a NUL-terminated string, as for `open(2)`.
#[no_mangle]
pub unsafe extern "C" fn open_int(path: *const c_char, oflag: c_int) -> c_int {
    let ret = unsafe { libc::open(path, oflag) };
    trace::record(ret, || format!("open({path:p}, {oflag:#o})"))
}

/// Three-argument form of `open`
///
/// `mode` travels through the variadic slot promoted to `c_uint`, as a C
/// caller's default argument promotion would do.
///
/// # Safety
/// `path` must point to a NUL-terminated string, as for `open(2)`.
#[no_mangle]
pub unsafe extern "C" fn open_int_mode(path: *const c_char, oflag: c_int, mode: mode_t) -> c_int {
    let ret = unsafe { libc::open(path, oflag, mode as c_uint) };
    trace::record(ret, || format!("open({path:p}, {oflag:#o}, {mode:#o})"))
}
