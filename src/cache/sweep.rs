//! Expiry of unused cache entries
//!
//! Sweeps are opportunistic and rate limited by a `last-cleaned` marker at
//! the top of the cache root. The marker is rewritten before scanning so
//! concurrent invocations quickly agree that a sweep is under way. Two
//! processes may still both sweep once; that only wastes a little I/O.

use crate::error::{GorunError, GorunResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Name of the marker file recording the last sweep
pub const CLEAN_MARKER: &str = "last-cleaned";

/// What a sweep call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The root was swept recently; nothing was scanned
    Skipped { last: DateTime<Utc> },
    /// The root was scanned and expired entries removed
    Swept { removed: Vec<PathBuf> },
}

/// Read the time of the last sweep, if any
///
/// A missing marker, or one whose content isn't a timestamp, means the
/// root has never been swept.
pub fn last_cleaned(cache_root: &Path) -> GorunResult<Option<DateTime<Utc>>> {
    let marker = cache_root.join(CLEAN_MARKER);
    match fs::read_to_string(&marker) {
        Ok(content) => Ok(DateTime::parse_from_rfc3339(content.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GorunError::io(format!("reading {}", marker.display()), e)),
    }
}

fn write_marker(cache_root: &Path, now: DateTime<Utc>) -> GorunResult<()> {
    let marker = cache_root.join(CLEAN_MARKER);
    fs::write(&marker, now.to_rfc3339_opts(SecondsFormat::Secs, true))
        .map_err(|e| GorunError::io(format!("writing {}", marker.display()), e))
}

/// Remove entries of `cache_root` not accessed within `retention` of `now`
///
/// Marker errors are returned; failures on individual entries are logged
/// and skipped.
pub fn sweep(cache_root: &Path, now: SystemTime, retention: Duration) -> GorunResult<SweepOutcome> {
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);
    let now_utc: DateTime<Utc> = now.into();

    if let Some(last) = last_cleaned(cache_root)? {
        if SystemTime::from(last) > cutoff {
            debug!("Cache root swept at {}, skipping", last);
            return Ok(SweepOutcome::Skipped { last });
        }
    }
    write_marker(cache_root, now_utc)?;

    let entries = match fs::read_dir(cache_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {}: {}", cache_root.display(), e);
            return Ok(SweepOutcome::Swept { removed: vec![] });
        }
    };

    let mut removed = Vec::new();
    for entry in entries.flatten() {
        if entry.file_name() == CLEAN_MARKER {
            continue;
        }
        let path = entry.path();
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let accessed = match meta.accessed() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if accessed >= cutoff {
            continue;
        }

        let result = if meta.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                info!("Removed expired cache entry {}", path.display());
                removed.push(path);
            }
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    Ok(SweepOutcome::Swept { removed })
}
