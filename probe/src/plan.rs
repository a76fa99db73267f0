use std::{
    ffi::c_int,
    fs::File,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Result};
use nix::{errno::Errno, fcntl::OFlag};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Plan {
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Step {
    Open {
        handle: String,
        path: PathBuf,
        #[serde(default)]
        flags: Vec<String>,
        /// Octal permission bits; selects the three-argument form
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        expect: Option<String>,
    },
    Fcntl {
        handle: String,
        cmd: FcntlCmd,
        /// Integer argument; required exactly for the commands that take one
        #[serde(default)]
        arg: Option<i64>,
        /// Handle to register the descriptor returned by a dup command under
        #[serde(default, rename = "as")]
        into: Option<String>,
        #[serde(default)]
        expect: Option<String>,
    },
    Lock {
        handle: String,
        cmd: LockCmd,
        kind: LockKind,
        #[serde(default)]
        start: i64,
        #[serde(default)]
        len: i64,
        #[serde(default)]
        expect: Option<String>,
    },
    Ioctl {
        handle: String,
        request: IoctlRequest,
        #[serde(default)]
        expect: Option<String>,
    },
    Close {
        handle: String,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum FcntlCmd {
    #[serde(rename = "F_GETFD")]
    GetFd,
    #[serde(rename = "F_SETFD")]
    SetFd,
    #[serde(rename = "F_GETFL")]
    GetFl,
    #[serde(rename = "F_SETFL")]
    SetFl,
    #[serde(rename = "F_DUPFD")]
    DupFd,
    #[serde(rename = "F_DUPFD_CLOEXEC")]
    DupFdCloexec,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum LockCmd {
    #[serde(rename = "F_GETLK")]
    GetLk,
    #[serde(rename = "F_SETLK")]
    SetLk,
    #[serde(rename = "F_SETLKW")]
    SetLkW,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    Read,
    Write,
    Unlock,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum IoctlRequest {
    /// Bytes available for reading, written through the data pointer
    #[serde(rename = "FIONREAD")]
    FionRead,
    #[serde(rename = "FIOCLEX")]
    FioClex,
    #[serde(rename = "FIONCLEX")]
    FioNclex,
}

/// What a step is expected to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    Ok,
    Errno(Errno),
}

impl Plan {
    pub fn from_file(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        let plan: Plan = serde_yaml::from_reader(&f)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let plan: Plan = serde_yaml::from_str(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Resolves every symbolic value once so that bad names fail before any
    /// call is made
    pub fn validate(&self) -> Result<()> {
        for (idx, step) in self.steps.iter().enumerate() {
            let expect = match step {
                Step::Open {
                    flags,
                    mode,
                    expect,
                    ..
                } => {
                    let oflag = open_flags(flags)?;
                    match mode {
                        Some(mode) => {
                            parse_mode(mode)?;
                        }
                        None if needs_mode(oflag) => {
                            bail!("step {idx}: open with O_CREAT or O_TMPFILE needs a mode")
                        }
                        None => {}
                    }
                    expect
                }
                Step::Fcntl {
                    cmd,
                    arg,
                    into,
                    expect,
                    ..
                } => {
                    match (cmd.takes_arg(), arg) {
                        (true, None) => bail!("step {idx}: {cmd:?} needs an arg"),
                        (false, Some(_)) => bail!("step {idx}: {cmd:?} takes no arg"),
                        _ => {}
                    }
                    match (cmd.dups(), into) {
                        (true, None) => bail!("step {idx}: {cmd:?} needs an `as` handle"),
                        (false, Some(_)) => bail!("step {idx}: `as` only applies to dup commands"),
                        _ => {}
                    }
                    expect
                }
                Step::Lock { expect, .. }
                | Step::Ioctl { expect, .. } => expect,
                Step::Close { .. } => &None,
            };
            if let Some(expect) = expect {
                Expect::parse(expect).map_err(|e| anyhow!("step {idx}: {e}"))?;
            }
        }
        Ok(())
    }
}

impl Step {
    pub fn handle(&self) -> &str {
        match self {
            Step::Open { handle, .. }
            | Step::Fcntl { handle, .. }
            | Step::Lock { handle, .. }
            | Step::Ioctl { handle, .. }
            | Step::Close { handle } => handle,
        }
    }
}

impl FcntlCmd {
    pub fn raw(self) -> c_int {
        match self {
            FcntlCmd::GetFd => libc::F_GETFD,
            FcntlCmd::SetFd => libc::F_SETFD,
            FcntlCmd::GetFl => libc::F_GETFL,
            FcntlCmd::SetFl => libc::F_SETFL,
            FcntlCmd::DupFd => libc::F_DUPFD,
            FcntlCmd::DupFdCloexec => libc::F_DUPFD_CLOEXEC,
        }
    }

    /// Whether the command reads an integer from the variadic slot
    pub fn takes_arg(self) -> bool {
        !matches!(self, FcntlCmd::GetFd | FcntlCmd::GetFl)
    }

    /// Whether a successful call returns a new descriptor
    pub fn dups(self) -> bool {
        matches!(self, FcntlCmd::DupFd | FcntlCmd::DupFdCloexec)
    }
}

impl LockCmd {
    pub fn raw(self) -> c_int {
        match self {
            LockCmd::GetLk => libc::F_GETLK,
            LockCmd::SetLk => libc::F_SETLK,
            LockCmd::SetLkW => libc::F_SETLKW,
        }
    }
}

impl LockKind {
    pub fn raw(self) -> c_int {
        match self {
            LockKind::Read => libc::F_RDLCK,
            LockKind::Write => libc::F_WRLCK,
            LockKind::Unlock => libc::F_UNLCK,
        }
    }

    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            libc::F_RDLCK => Some(LockKind::Read),
            libc::F_WRLCK => Some(LockKind::Write),
            libc::F_UNLCK => Some(LockKind::Unlock),
            _ => None,
        }
    }
}

impl IoctlRequest {
    pub fn raw(self) -> libc::c_ulong {
        match self {
            IoctlRequest::FionRead => libc::FIONREAD as libc::c_ulong,
            IoctlRequest::FioClex => libc::FIOCLEX as libc::c_ulong,
            IoctlRequest::FioNclex => libc::FIONCLEX as libc::c_ulong,
        }
    }
}

impl Expect {
    /// Accepts `ok` or an errno name such as `ENOENT`
    ///
    /// Alias names resolve to the errno they share a value with.
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("ok") {
            return Ok(Expect::Ok);
        }
        match s {
            "EWOULDBLOCK" => return Ok(Expect::Errno(Errno::EWOULDBLOCK)),
            "EDEADLOCK" => return Ok(Expect::Errno(Errno::EDEADLOCK)),
            "ENOTSUP" => return Ok(Expect::Errno(Errno::ENOTSUP)),
            _ => {}
        }
        // Errno has no FromStr; its Debug form is the symbolic name
        (1..4096)
            .map(Errno::from_raw)
            .find(|e| format!("{e:?}") == s)
            .map(Expect::Errno)
            .ok_or_else(|| anyhow!("unknown errno name {s:?}"))
    }

    pub fn matches(&self, ret: c_int, errno: Option<Errno>) -> bool {
        match self {
            Expect::Ok => ret != -1,
            Expect::Errno(expected) => ret == -1 && errno == Some(*expected),
        }
    }
}

/// Combines `O_*` flag names into the raw `oflag` argument
pub fn open_flags<S: AsRef<str>>(names: &[S]) -> Result<c_int> {
    let mut oflag = OFlag::empty();
    for name in names {
        let name = name.as_ref();
        oflag |= OFlag::from_name(name).ok_or_else(|| anyhow!("unknown open flag {name:?}"))?;
    }
    Ok(oflag.bits())
}

/// `open` reads its mode argument only for these flags
pub fn needs_mode(oflag: c_int) -> bool {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let tmpfile = (oflag & libc::O_TMPFILE) == libc::O_TMPFILE;
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let tmpfile = false;
    tmpfile || (oflag & libc::O_CREAT) != 0
}

/// Parses octal permission bits, with or without a `0o` prefix
pub fn parse_mode(s: &str) -> Result<libc::mode_t> {
    let digits = s.strip_prefix("0o").unwrap_or(s);
    let mode = u32::from_str_radix(digits, 8).map_err(|e| anyhow!("invalid mode {s:?}: {e}"))?;
    if mode > 0o7777 {
        bail!("mode {s:?} out of range")
    }
    Ok(mode as libc::mode_t)
}
