//! Compiling sources into the cache
//!
//! Every compile writes to a temporary name qualified by this process id
//! and then renames it over the published path. Concurrent compiles of the
//! same source never share an intermediate file, and readers only ever see a
//! complete binary: whichever rename lands last wins.

pub mod toolchain;

pub use toolchain::{BuildRequest, GoToolchain, Toolchain};

use crate::cache::freshness::OWNER_RWX;
use crate::cache::{CacheEntry, SourceUnit};
use crate::error::{GorunError, GorunResult};
use crate::manifest;
use filetime::FileTime;
use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Interpreter directive at the top of a script
const SHEBANG: &[u8] = b"#!";

/// Comment start accepted by the Go compiler, same length as the directive
const LINE_COMMENT: &[u8] = b"//";

/// Rewrite a leading `#!` into `//`, returning whether anything changed
pub fn neutralize_shebang(content: &mut [u8]) -> bool {
    if content.len() > SHEBANG.len() && content.starts_with(SHEBANG) {
        content[..LINE_COMMENT.len()].copy_from_slice(LINE_COMMENT);
        true
    } else {
        false
    }
}

/// A private copy of the source, removed when dropped
///
/// Dropping happens on every exit path of a compile, before any handoff.
#[derive(Debug)]
pub struct ScratchSource {
    path: PathBuf,
}

impl ScratchSource {
    /// Write `content` to `path` with owner-only permissions
    pub fn create(path: PathBuf, content: &[u8]) -> GorunResult<Self> {
        manifest::write_private(&path, content)?;
        Ok(Self { path })
    }

    /// Path of the copy
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchSource {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Removes an unpublished temporary binary on failure
struct PendingOutput<'a> {
    path: &'a Path,
    published: bool,
}

impl Drop for PendingOutput<'_> {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(self.path);
        }
    }
}

/// Builds sources into cache entries
pub struct Builder<'a, T: Toolchain + ?Sized> {
    toolchain: &'a T,
    env: Vec<(String, String)>,
    pid: u32,
}

impl<'a, T: Toolchain + ?Sized> Builder<'a, T> {
    /// Create a builder using `toolchain`
    pub fn new(toolchain: &'a T) -> Self {
        Self {
            toolchain,
            env: Vec::new(),
            pid: std::process::id(),
        }
    }

    /// Extra variables layered onto every build environment
    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    /// Compile `source` and atomically publish it at `entry.binary`
    ///
    /// Returns the snapshot of the source that was actually compiled; the
    /// published binary's mtime equals its `modified` time.
    pub async fn compile(&self, source: &SourceUnit, entry: &CacheEntry) -> GorunResult<SourceUnit> {
        // Stat before reading: a change after this point makes the pinned
        // mtime older than the source, so the next run rebuilds.
        let source = source.refresh()?;

        DirBuilder::new()
            .recursive(true)
            .mode(OWNER_RWX)
            .create(&entry.dir)
            .map_err(|e| GorunError::io(format!("creating {}", entry.dir.display()), e))?;
        // Sweeps judge the directory's atime; a rebuild counts as a use
        let now = FileTime::now();
        filetime::set_file_times(&entry.dir, now, now)
            .map_err(|e| GorunError::io(format!("touching {}", entry.dir.display()), e))?;

        let mut content = fs::read(&source.path)
            .map_err(|e| GorunError::io(format!("reading {}", source.path.display()), e))?;
        let rewritten = neutralize_shebang(&mut content);

        let text = String::from_utf8_lossy(&content).into_owned();
        let mut extracted = false;
        // TODO: build from a per-pid subdirectory; concurrent compiles of one
        // source currently share these files
        for name in [manifest::GO_MOD, manifest::GO_SUM] {
            let dest = entry.dir.join(name);
            match fs::remove_file(&dest) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(GorunError::io(format!("removing {}", dest.display()), e)),
            }
            extracted |= manifest::write_section(&text, name, &dest)?;
        }

        let mut env = self.env.clone();
        env.extend(manifest::env_assignments(&text));

        let scratch = if rewritten || extracted {
            Some(ScratchSource::create(entry.scratch_source(self.pid), &content)?)
        } else {
            None
        };
        let (build_source, work_dir) = match &scratch {
            Some(scratch) => (scratch.path(), Some(entry.dir.as_path())),
            None => (source.path.as_path(), None),
        };

        let temp = entry.temp_binary(self.pid);
        let mut pending = PendingOutput {
            path: &temp,
            published: false,
        };

        info!(
            "Compiling {} with {}",
            source.path.display(),
            self.toolchain.name()
        );
        self.toolchain
            .build(&BuildRequest {
                source: build_source,
                output: &temp,
                work_dir,
                env: &env,
            })
            .await?;

        ensure_owner_rwx(&temp)?;
        fs::rename(&temp, &entry.binary).map_err(|e| {
            GorunError::io(format!("publishing {}", entry.binary.display()), e)
        })?;
        pending.published = true;
        debug!("Published {}", entry.binary.display());

        let mtime = FileTime::from_system_time(source.modified);
        filetime::set_file_mtime(&entry.binary, mtime).map_err(|e| {
            GorunError::io(format!("setting mtime of {}", entry.binary.display()), e)
        })?;

        Ok(source)
    }
}

/// Published binaries always carry full owner permissions
fn ensure_owner_rwx(path: &Path) -> GorunResult<()> {
    let meta = fs::metadata(path)
        .map_err(|e| GorunError::io(format!("inspecting {}", path.display()), e))?;
    let mode = meta.permissions().mode();
    if mode & OWNER_RWX != OWNER_RWX {
        fs::set_permissions(path, Permissions::from_mode(mode | OWNER_RWX))
            .map_err(|e| GorunError::io(format!("chmod {}", path.display()), e))?;
    }
    Ok(())
}
