//! Rust-side view of a shim result
//!
//! The exported shims never use this; it exists for Rust callers that want a
//! `Result` instead of the `-1` + `errno` convention.

use std::ffi::c_int;

use nix::errno::Errno;
use thiserror::Error;

pub type CallResult<T> = Result<T, CallError>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{call} failed: {errno}")]
pub struct CallError {
    call: &'static str,
    errno: Errno,
}

impl CallError {
    pub fn new(call: &'static str, errno: Errno) -> Self {
        Self { call, errno }
    }
    pub fn call(&self) -> &'static str {
        self.call
    }
    pub fn errno(&self) -> Errno {
        self.errno
    }
}

/// Turns a raw shim result into a [`CallResult`]
///
/// Must run before anything else can touch `errno` on this thread.
pub fn check(call: &'static str, ret: c_int) -> CallResult<c_int> {
    if ret == -1 {
        return Err(CallError::new(call, Errno::last()));
    }
    Ok(ret)
}
