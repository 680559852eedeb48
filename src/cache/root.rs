//! Cache root discovery
//!
//! A cache root lives at `<temp>/gorun-<host>-<euid>[-<n>]/<os>_<arch>`.
//! It is only used when it is a real directory with mode `0700` owned by the
//! effective user. Anything else is left alone and the next disambiguated
//! name is tried. Trust is re-checked on every invocation.

use crate::error::{GorunError, GorunResult};
use std::fs::{self, DirBuilder, Metadata, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The only mode a trusted cache root may have
pub const ROOT_MODE: u32 = 0o700;

/// Default ceiling on disambiguation attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;

/// Who is asking for a cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub hostname: String,
    pub euid: u32,
    pub egid: u32,
}

impl Identity {
    /// Identity of the current process
    pub fn current() -> GorunResult<Self> {
        // SAFETY: geteuid/getegid cannot fail and touch no memory.
        let (euid, egid) = unsafe { (libc::geteuid(), libc::getegid()) };
        Ok(Self {
            hostname: hostname()?,
            euid,
            egid,
        })
    }

    fn prefix(&self) -> String {
        format!("gorun-{}-{}", self.hostname, self.euid)
    }
}

fn hostname() -> GorunResult<String> {
    let mut buf = [0u8; 256];
    // SAFETY: buf is valid for buf.len() bytes; the result is NUL terminated
    // or truncated, which the scan below handles.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(GorunError::Environment(format!(
            "can't get hostname: {}",
            io::Error::last_os_error()
        )));
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..len]).replace('/', "_"))
}

/// Platform suffix separating roots of different targets
pub fn platform_suffix() -> String {
    format!("{}_{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// A directory that passed the ownership audit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    path: PathBuf,
}

impl CacheRoot {
    /// Directory of the cache root
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Settings for locating a cache root
#[derive(Debug, Clone)]
pub struct RootGuard {
    temp_root: PathBuf,
    identity: Identity,
    max_attempts: u32,
}

impl RootGuard {
    /// Create a guard for `identity` below `temp_root`
    pub fn new(temp_root: impl Into<PathBuf>, identity: Identity) -> Self {
        Self {
            temp_root: temp_root.into(),
            identity,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the disambiguation ceiling
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Candidate directory for disambiguation counter `n`
    pub fn candidate(&self, n: u32) -> PathBuf {
        let prefix = if n == 0 {
            self.identity.prefix()
        } else {
            format!("{}-{}", self.identity.prefix(), n)
        };
        self.temp_root.join(prefix).join(platform_suffix())
    }

    /// Find or create a trustworthy cache root
    pub fn acquire(&self) -> GorunResult<CacheRoot> {
        self.check_temp_root()?;

        for n in 0..self.max_attempts {
            let candidate = self.candidate(n);

            match fs::symlink_metadata(&candidate) {
                Ok(meta) if self.is_trusted(&meta) => {
                    debug!("Using cache root {}", candidate.display());
                    return Ok(CacheRoot { path: candidate });
                }
                Ok(_) => {
                    warn!("Ignoring untrusted cache directory {}", candidate.display());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => match self.create(&candidate) {
                    Ok(()) => {
                        debug!("Created cache root {}", candidate.display());
                        return Ok(CacheRoot { path: candidate });
                    }
                    Err(e) => {
                        debug!("Could not create {}: {}", candidate.display(), e);
                    }
                },
                Err(e) => {
                    debug!("Could not inspect {}: {}", candidate.display(), e);
                }
            }
        }

        Err(GorunError::Environment(format!(
            "no trustworthy cache directory under {} after {} attempts",
            self.temp_root.display(),
            self.max_attempts
        )))
    }

    /// The temp root must be a directory this user can write into
    fn check_temp_root(&self) -> GorunResult<()> {
        let writable = fs::metadata(&self.temp_root)
            .map(|meta| meta.is_dir() && can_write(&meta, self.identity.euid, self.identity.egid))
            .unwrap_or(false);

        if writable {
            Ok(())
        } else {
            Err(GorunError::Environment(format!(
                "can't write on directory: {}",
                self.temp_root.display()
            )))
        }
    }

    fn is_trusted(&self, meta: &Metadata) -> bool {
        meta.is_dir()
            && meta.permissions().mode() & 0o7777 == ROOT_MODE
            && meta.uid() == self.identity.euid
    }

    /// Create parents as needed, then the leaf itself exclusively
    ///
    /// The leaf is created with a plain mkdir so that a directory planted by
    /// someone else in the meantime makes this fail instead of being adopted.
    fn create(&self, candidate: &Path) -> io::Result<()> {
        if let Some(parent) = candidate.parent() {
            DirBuilder::new()
                .recursive(true)
                .mode(ROOT_MODE)
                .create(parent)?;
        }
        DirBuilder::new().mode(ROOT_MODE).create(candidate)?;
        // umask may have stripped bits
        fs::set_permissions(candidate, Permissions::from_mode(ROOT_MODE))?;

        let meta = fs::symlink_metadata(candidate)?;
        if self.is_trusted(&meta) {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "created directory failed the ownership audit",
            ))
        }
    }
}

fn can_write(meta: &Metadata, euid: u32, egid: u32) -> bool {
    let perm = meta.permissions().mode();
    perm & 0o002 != 0
        || (perm & 0o020 != 0 && meta.gid() == egid)
        || (perm & 0o200 != 0 && meta.uid() == euid)
}
