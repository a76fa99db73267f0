//! Trace hook shared by all shims

use std::ffi::c_int;

use log::Level;
use nix::errno::Errno;

/// Logs a completed call at trace level and hands back its result
///
/// The logger may itself perform system calls, so `errno` is captured before
/// and written back after logging. `describe` only runs if trace logging is
/// enabled.
pub fn record<F>(ret: c_int, describe: F) -> c_int
where
    F: FnOnce() -> String,
{
    if log_enabled!(Level::Trace) {
        let errno = Errno::last_raw();
        if ret == -1 {
            trace!("{} = -1 ({})", describe(), Errno::from_raw(errno));
        } else {
            trace!("{} = {ret}", describe());
        }
        Errno::set_raw(errno);
    }
    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_passes_result_through() {
        Errno::set_raw(libc::EAGAIN);
        let ret = record(-1, || "poke()".into());
        assert_eq!(ret, -1);
        assert_eq!(Errno::last(), Errno::EAGAIN);
    }

    #[test]
    fn record_skips_describe_when_disabled() {
        if log_enabled!(Level::Trace) {
            return;
        }
        let ret = record(7, || panic!("formatted although tracing is off"));
        assert_eq!(ret, 7);
    }
}
