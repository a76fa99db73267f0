//! Executes a [`Plan`] through the shims

use std::{
    collections::HashMap,
    ffi::{c_int, c_long, c_void, CString},
    mem::zeroed,
    os::{fd::RawFd, unix::ffi::OsStrExt},
};

use anyhow::{anyhow, bail, Result};
use fdshim::{
    fcntl_int, fcntl_int_flock, fcntl_int_long, ioctl_long, ioctl_long_void, open_int,
    open_int_mode,
};
use nix::{errno::Errno, unistd::close};

use crate::plan::{open_flags, parse_mode, Expect, IoctlRequest, LockKind, Plan, Step};

/// Raw result of one executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub step: usize,
    pub call: &'static str,
    pub ret: c_int,
    pub errno: Option<Errno>,
    /// Value written back through a payload pointer, if the call has one
    pub data: Option<i64>,
}

#[derive(Debug, Default)]
pub struct Runner {
    handles: HashMap<String, RawFd>,
    outcomes: Vec<Outcome>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every step in order and stops at the first unmet expectation
    pub fn run(mut self, plan: &Plan) -> Result<Vec<Outcome>> {
        for (idx, step) in plan.steps.iter().enumerate() {
            let outcome = self.execute(idx, step)?;
            report(&outcome);

            if let Some(expect) = expectation(step)? {
                if !expect.matches(outcome.ret, outcome.errno) {
                    bail!(
                        "step {idx} ({}): expected {expect:?}, got {} ({:?})",
                        outcome.call,
                        outcome.ret,
                        outcome.errno
                    );
                }
            }
            self.outcomes.push(outcome);
        }
        Ok(std::mem::take(&mut self.outcomes))
    }

    fn fd(&self, handle: &str) -> Result<RawFd> {
        self.handles
            .get(handle)
            .copied()
            .ok_or_else(|| anyhow!("unknown handle {handle:?}"))
    }

    fn execute(&mut self, idx: usize, step: &Step) -> Result<Outcome> {
        let mut data: Option<i64> = None;
        let (call, ret) = match step {
            Step::Open {
                handle,
                path,
                flags,
                mode,
                ..
            } => {
                if self.handles.contains_key(handle) {
                    bail!("handle {handle:?} is already open");
                }
                let path = CString::new(path.as_os_str().as_bytes())?;
                let oflag = open_flags(flags)?;
                let ret = match mode {
                    Some(mode) => {
                        let mode = parse_mode(mode)?;
                        unsafe { open_int_mode(path.as_ptr(), oflag, mode) }
                    }
                    None => unsafe { open_int(path.as_ptr(), oflag) },
                };
                if ret != -1 {
                    self.handles.insert(handle.clone(), ret);
                }
                ("open", ret)
            }
            Step::Fcntl {
                handle,
                cmd,
                arg,
                into,
                ..
            } => {
                let fd = self.fd(handle)?;
                if let Some(into) = into {
                    if self.handles.contains_key(into) {
                        bail!("handle {into:?} is already open");
                    }
                }
                let ret = match arg {
                    Some(arg) => unsafe { fcntl_int_long(fd, cmd.raw(), *arg as c_long) },
                    None => unsafe { fcntl_int(fd, cmd.raw()) },
                };
                if cmd.dups() && ret != -1 {
                    if let Some(into) = into {
                        self.handles.insert(into.clone(), ret);
                    }
                }
                ("fcntl", ret)
            }
            Step::Lock {
                handle,
                cmd,
                kind,
                start,
                len,
                ..
            } => {
                let fd = self.fd(handle)?;
                let mut lock: libc::flock = unsafe { zeroed() };
                lock.l_type = kind.raw() as _;
                lock.l_whence = libc::SEEK_SET as _;
                lock.l_start = *start as _;
                lock.l_len = *len as _;
                let ret = unsafe { fcntl_int_flock(fd, cmd.raw(), &mut lock) };
                if ret != -1 {
                    data = Some(lock.l_type as i64);
                    if let Some(kind) = LockKind::from_raw(lock.l_type as c_int) {
                        debug!("lock record now reads {kind:?}");
                    }
                }
                ("fcntl", ret)
            }
            Step::Ioctl {
                handle, request, ..
            } => {
                let fd = self.fd(handle)?;
                let ret = match request {
                    IoctlRequest::FionRead => {
                        let mut available: c_int = 0;
                        let ret = unsafe {
                            ioctl_long_void(
                                fd,
                                request.raw(),
                                &mut available as *mut c_int as *mut c_void,
                            )
                        };
                        if ret != -1 {
                            data = Some(i64::from(available));
                        }
                        ret
                    }
                    IoctlRequest::FioClex | IoctlRequest::FioNclex => unsafe {
                        ioctl_long(fd, request.raw())
                    },
                };
                ("ioctl", ret)
            }
            Step::Close { handle } => {
                let fd = self.fd(handle)?;
                self.handles.remove(handle);
                let ret = match close(fd) {
                    Ok(()) => 0,
                    Err(e) => {
                        Errno::set_raw(e as i32);
                        -1
                    }
                };
                ("close", ret)
            }
        };
        // errno must be sampled before anything else runs
        let errno = (ret == -1).then(Errno::last);

        Ok(Outcome {
            step: idx,
            call,
            ret,
            errno,
            data,
        })
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        for (handle, fd) in self.handles.drain() {
            trace!("closing leftover handle {handle:?}");
            if let Err(e) = close(fd) {
                warn!("failed to close handle {handle:?}: {e}");
            }
        }
    }
}

fn expectation(step: &Step) -> Result<Option<Expect>> {
    let expect = match step {
        Step::Open { expect, .. }
        | Step::Fcntl { expect, .. }
        | Step::Lock { expect, .. }
        | Step::Ioctl { expect, .. } => expect,
        Step::Close { .. } => return Ok(None),
    };
    expect.as_deref().map(Expect::parse).transpose()
}

fn report(outcome: &Outcome) {
    let Outcome {
        step,
        call,
        ret,
        errno,
        data,
    } = outcome;
    match (errno, data) {
        (Some(errno), _) => warn!("#{step} {call} = {ret} ({errno})"),
        (None, Some(data)) => info!("#{step} {call} = {ret}, data = {data}"),
        (None, None) => info!("#{step} {call} = {ret}"),
    }
}
