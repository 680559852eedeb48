//! Staleness checks for cached binaries

use crate::cache::source::{CacheEntry, SourceUnit};
use crate::error::{GorunError, GorunResult};
use filetime::FileTime;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::time::SystemTime;
use tracing::debug;

/// Owner bits every published binary keeps
pub const OWNER_RWX: u32 = 0o700;

/// Why a cached binary must be rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Nothing has been published yet
    Missing,
    /// The source changed after the binary was built
    SourceNewer,
    /// Someone relaxed the binary's owner permission bits
    PermissionsChanged,
    /// The binary disappeared right before it was executed
    Vanished,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "no cached binary"),
            Self::SourceNewer => write!(f, "source is newer than cached binary"),
            Self::PermissionsChanged => write!(f, "cached binary permissions changed"),
            Self::Vanished => write!(f, "cached binary was removed"),
        }
    }
}

/// Verdict of the freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The cached binary can be executed as is
    Fresh,
    /// The binary must be (re)built first
    Stale(StaleReason),
}

impl Freshness {
    /// Whether a compile is required
    pub fn needs_compile(&self) -> bool {
        matches!(self, Self::Stale(_))
    }
}

/// Compare a source snapshot against its cache entry
pub fn check(source: &SourceUnit, entry: &CacheEntry) -> GorunResult<Freshness> {
    let meta = match fs::symlink_metadata(&entry.binary) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Freshness::Stale(StaleReason::Missing));
        }
        Err(e) => {
            return Err(GorunError::io(
                format!("inspecting {}", entry.binary.display()),
                e,
            ))
        }
    };

    if !meta.file_type().is_file() {
        return Err(GorunError::Integrity(entry.binary.clone()));
    }

    let modified = meta
        .modified()
        .map_err(|e| GorunError::io(format!("reading mtime of {}", entry.binary.display()), e))?;

    let verdict = if modified < source.modified {
        Freshness::Stale(StaleReason::SourceNewer)
    } else if meta.permissions().mode() & OWNER_RWX != OWNER_RWX {
        Freshness::Stale(StaleReason::PermissionsChanged)
    } else {
        Freshness::Fresh
    };

    debug!("Freshness of {}: {:?}", entry.binary.display(), verdict);
    Ok(verdict)
}

/// Mark a fresh entry as recently used
///
/// The entry directory is what the sweeper judges, so it gets both times
/// bumped. The binary only gets its access time bumped: its modification
/// time stays pinned to the source it was built from.
pub fn mark_used(entry: &CacheEntry, now: SystemTime) -> io::Result<()> {
    let now = FileTime::from_system_time(now);
    filetime::set_file_times(&entry.dir, now, now)?;
    filetime::set_file_atime(&entry.binary, now)
}
