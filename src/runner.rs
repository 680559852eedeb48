//! Compile-if-needed, then hand off
//!
//! One invocation resolves the source, audits the cache root, decides
//! whether the cached binary can be used, builds it if not, and replaces
//! the process with it. If the binary vanishes between the decision and the
//! handoff (a concurrent sweep), the cycle is repeated a bounded number of
//! times.

use crate::build::{Builder, Toolchain};
use crate::cache::freshness::{self, Freshness, StaleReason};
use crate::cache::{sweep, CacheEntry, RootGuard, SourceUnit, SweepOutcome};
use crate::error::{GorunError, GorunResult};
use crate::exec::Launcher;
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Total compile-and-execute attempts per invocation
pub const MAX_ATTEMPTS: u32 = 3;

/// Drives a single gorun invocation
pub struct Runner<'a, T: Toolchain + ?Sized, L: Launcher> {
    guard: RootGuard,
    builder: Builder<'a, T>,
    launcher: L,
    retention: Duration,
}

impl<'a, T: Toolchain + ?Sized, L: Launcher> Runner<'a, T, L> {
    /// Create a runner
    pub fn new(guard: RootGuard, builder: Builder<'a, T>, launcher: L, retention: Duration) -> Self {
        Self {
            guard,
            builder,
            launcher,
            retention,
        }
    }

    /// Run `args[0]` as a Go program with `args` as its argument vector
    ///
    /// Only returns on failure when used with a process-replacing launcher.
    pub async fn run(&self, args: &[OsString]) -> GorunResult<L::Handoff> {
        let raw = args
            .first()
            .ok_or_else(|| GorunError::User("no source file given".to_string()))?;

        // Taken before the source is stat'ed, so a change racing with this
        // run is still seen as newer by the next one.
        let now = SystemTime::now();
        let source = SourceUnit::resolve(Path::new(raw))?;
        let root = self.guard.acquire()?;
        let entry = CacheEntry::for_source(root.path(), &source);

        let mut verdict = freshness::check(&source, &entry)?;
        match verdict {
            Freshness::Fresh => self.tidy(root.path(), &entry, now),
            Freshness::Stale(reason) => debug!("Rebuilding {}: {}", source.path.display(), reason),
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            if verdict.needs_compile() {
                self.builder.compile(&source, &entry).await?;
            }

            match self.launcher.launch(&entry.binary, args) {
                Ok(handoff) => return Ok(handoff),
                Err(e) if e.kind() == io::ErrorKind::NotFound && !entry.binary.exists() => {
                    warn!(
                        "{} disappeared before it could run (attempt {}/{})",
                        entry.binary.display(),
                        attempt,
                        MAX_ATTEMPTS
                    );
                    verdict = Freshness::Stale(StaleReason::Vanished);
                    last_error = Some(e);
                }
                Err(e) => {
                    return Err(GorunError::Exec {
                        path: entry.binary.clone(),
                        source: e,
                    })
                }
            }
        }

        Err(GorunError::VanishedArtifact {
            path: entry.binary,
            attempts: MAX_ATTEMPTS,
            source: last_error.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotFound)),
        })
    }

    /// Cache hit housekeeping: mark the entry used, then maybe sweep
    fn tidy(&self, root: &Path, entry: &CacheEntry, now: SystemTime) {
        if let Err(e) = freshness::mark_used(entry, now) {
            // Someone else is managing this entry right now
            debug!("Not sweeping, could not mark {} used: {}", entry.dir.display(), e);
            return;
        }

        match sweep(root, now, self.retention) {
            Ok(SweepOutcome::Swept { removed }) => {
                info!("Swept cache root, removed {} entries", removed.len())
            }
            Ok(SweepOutcome::Skipped { .. }) => {}
            Err(e) => warn!("Cache sweep failed: {}", e),
        }
    }
}
