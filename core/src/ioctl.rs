//! Shims for `ioctl`
//!
//! The request is declared `unsigned long` at the ABI. Platforms whose libc
//! declares a narrower request type receive the value converted the same way
//! a C compiler would convert it.

use std::ffi::{c_int, c_ulong, c_void};

use crate::trace;

/// `ioctl` for requests without a payload, e.g. `FIOCLEX`
///
/// # Safety
/// The request must not expect a third argument.
#[no_mangle]
pub unsafe extern "C" fn ioctl_long(fd: c_int, request: c_ulong) -> c_int {
    let ret = unsafe { libc::ioctl(fd, request as _) };
    trace::record(ret, || format!("ioctl({fd}, {request:#x})"))
}

/// `ioctl` for requests reading or writing through `data`
///
/// # Safety
/// `data` must be valid for whatever the driver reads or writes for `request`.
#[no_mangle]
pub unsafe extern "C" fn ioctl_long_void(fd: c_int, request: c_ulong, data: *mut c_void) -> c_int {
    let ret = unsafe { libc::ioctl(fd, request as _, data) };
    trace::record(ret, || format!("ioctl({fd}, {request:#x}, {data:p})"))
}
