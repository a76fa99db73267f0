//! Shims for `fcntl`

use std::ffi::{c_int, c_long};

use libc::flock;

use crate::trace;

/// `fcntl` for commands without an argument, e.g. `F_GETFD` or `F_GETFL`
///
/// # Safety
/// Same contract as `fcntl(2)` for the given command.
#[no_mangle]
pub unsafe extern "C" fn fcntl_int(fildes: c_int, cmd: c_int) -> c_int {
    let ret = unsafe { libc::fcntl(fildes, cmd) };
    trace::record(ret, || format!("fcntl({fildes}, {cmd})"))
}

/// `fcntl` for the record locking commands `F_GETLK`, `F_SETLK` and `F_SETLKW`
///
/// # Safety
/// `flock` must be valid for the reads and writes the command performs.
#[no_mangle]
pub unsafe extern "C" fn fcntl_int_flock(fildes: c_int, cmd: c_int, flock: *mut flock) -> c_int {
    let ret = unsafe { libc::fcntl(fildes, cmd, flock) };
    trace::record(ret, || format!("fcntl({fildes}, {cmd}, {flock:p})"))
}

/// `fcntl` for commands taking an integer argument, e.g. `F_SETFD` or `F_DUPFD`
///
/// # Safety
/// Same contract as `fcntl(2)` for the given command.
#[no_mangle]
pub unsafe extern "C" fn fcntl_int_long(fildes: c_int, cmd: c_int, arg: c_long) -> c_int {
    let ret = unsafe { libc::fcntl(fildes, cmd, arg) };
    trace::record(ret, || format!("fcntl({fildes}, {cmd}, {arg})"))
}

#[cfg(test)]
mod tests {
    use std::{mem::zeroed, os::fd::AsRawFd};

    use nix::{errno::Errno, unistd::close};

    use super::*;

    fn lock_record(l_type: c_int) -> flock {
        let mut lock: flock = unsafe { zeroed() };
        lock.l_type = l_type as _;
        lock.l_whence = libc::SEEK_SET as _;
        lock.l_start = 0;
        lock.l_len = 0;
        lock
    }

    #[test]
    fn getfd_reflects_cloexec() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        // std opens with O_CLOEXEC
        let flags = unsafe { fcntl_int(fd, libc::F_GETFD) };
        assert_eq!(flags, unsafe { libc::fcntl(fd, libc::F_GETFD) });
        assert_eq!(flags & libc::FD_CLOEXEC, libc::FD_CLOEXEC);

        assert_eq!(unsafe { fcntl_int_long(fd, libc::F_SETFD, 0) }, 0);
        assert_eq!(unsafe { fcntl_int(fd, libc::F_GETFD) } & libc::FD_CLOEXEC, 0);
    }

    #[test]
    fn getfl_matches_native() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        let shim = unsafe { fcntl_int(fd, libc::F_GETFL) };
        assert!(shim >= 0);
        assert_eq!(shim, unsafe { libc::fcntl(fd, libc::F_GETFL) });
        assert_eq!(shim & libc::O_ACCMODE, libc::O_RDWR);
    }

    #[test]
    fn bad_descriptor() {
        assert_eq!(unsafe { fcntl_int(-1, libc::F_GETFD) }, -1);
        assert_eq!(Errno::last(), Errno::EBADF);
        assert_eq!(unsafe { fcntl_int_long(-1, libc::F_SETFD, 0) }, -1);
        assert_eq!(Errno::last(), Errno::EBADF);
    }

    #[test]
    fn dupfd_honours_minimum() {
        let file = tempfile::tempfile().unwrap();

        let dup = unsafe { fcntl_int_long(file.as_raw_fd(), libc::F_DUPFD_CLOEXEC, 100) };
        assert!(dup >= 100);
        close(dup).unwrap();
    }

    #[test]
    fn write_lock_roundtrip() {
        let file = tempfile::tempfile().unwrap();
        let fd = file.as_raw_fd();

        let mut lock = lock_record(libc::F_WRLCK);
        assert_eq!(unsafe { fcntl_int_flock(fd, libc::F_SETLK, &mut lock) }, 0);

        // Locks held by this process never conflict with itself
        let mut probe = lock_record(libc::F_WRLCK);
        assert_eq!(unsafe { fcntl_int_flock(fd, libc::F_GETLK, &mut probe) }, 0);
        assert_eq!(probe.l_type as c_int, libc::F_UNLCK);

        let mut unlock = lock_record(libc::F_UNLCK);
        assert_eq!(unsafe { fcntl_int_flock(fd, libc::F_SETLK, &mut unlock) }, 0);
    }

    #[test]
    fn write_lock_on_read_only_descriptor() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let read_only = std::fs::File::open(file.path()).unwrap();

        let mut lock = lock_record(libc::F_WRLCK);
        let ret = unsafe { fcntl_int_flock(read_only.as_raw_fd(), libc::F_SETLK, &mut lock) };
        assert_eq!(ret, -1);
        assert_eq!(Errno::last(), Errno::EBADF);
    }
}
