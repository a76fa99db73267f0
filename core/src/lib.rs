//! Fixed-arity shims for the variadic `open`, `fcntl` and `ioctl` calls
//!
//! Foreign-function layers that cannot issue C variadic calls link against
//! these symbols instead. Every shim forwards its arguments unchanged and
//! returns the raw result, leaving `errno` exactly as the system call set it.

#[macro_use]
extern crate log;

pub mod error;
pub mod fcntl;
pub mod ioctl;
pub mod open;
pub mod trace;

pub use fcntl::{fcntl_int, fcntl_int_flock, fcntl_int_long};
pub use ioctl::{ioctl_long, ioctl_long_void};
pub use open::{open_int, open_int_mode};
