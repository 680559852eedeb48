//! Source resolution and cache entry naming
//!
//! A source file is identified by its canonical path: absolute, with every
//! symlink resolved. That path is flattened into a single directory name
//! inside the cache root, so two spellings of the same file share one slot
//! and two different files never do.

use crate::error::{GorunError, GorunResult};
use sha2::{Digest, Sha256};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Suffix appended to the source's base name to form the binary name
pub const ENTRY_SUFFIX: &str = ".gorun";

/// Escaped names longer than this are shortened with a hash prefix
const MAX_ESCAPED_LEN: usize = 200;

/// Bytes of the escaped name kept after shortening
const KEPT_TAIL_LEN: usize = 150;

/// Snapshot of a source file taken once per invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Canonical path, the sole cache key
    pub path: PathBuf,
    /// Last modification time
    pub modified: SystemTime,
    /// Unix permission bits
    pub mode: u32,
}

impl SourceUnit {
    /// Resolve a user supplied path and snapshot its metadata
    pub fn resolve(raw: &Path) -> GorunResult<Self> {
        let path = fs::canonicalize(raw).map_err(|e| GorunError::resolution(raw, e))?;
        Self::stat(path)
    }

    /// Take a fresh snapshot of the same resolved path
    ///
    /// Used right before compiling to narrow the window between the
    /// freshness check and reading the source.
    pub fn refresh(&self) -> GorunResult<Self> {
        Self::stat(self.path.clone())
    }

    fn stat(path: PathBuf) -> GorunResult<Self> {
        let meta = fs::metadata(&path).map_err(|e| GorunError::resolution(&path, e))?;
        if meta.is_dir() {
            return Err(GorunError::resolution(&path, "is a directory"));
        }
        let modified = meta
            .modified()
            .map_err(|e| GorunError::resolution(&path, e))?;

        Ok(Self {
            mode: meta.permissions().mode(),
            modified,
            path,
        })
    }

    /// Base file name of the source
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or_else(|| OsStr::new("main"))
    }
}

/// Location of a compiled binary inside a cache root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Per-source directory holding the binary and its build inputs
    pub dir: PathBuf,
    /// The published binary
    pub binary: PathBuf,
}

impl CacheEntry {
    /// Derive the entry for a resolved source
    pub fn for_source(cache_root: &Path, source: &SourceUnit) -> Self {
        let dir = cache_root.join(escape_path(&source.path));
        let mut name = source.file_name().to_os_string();
        name.push(ENTRY_SUFFIX);
        let binary = dir.join(name);
        Self { dir, binary }
    }

    /// Temporary path qualified by `pid`, used while building
    pub fn temp_binary(&self, pid: u32) -> PathBuf {
        let mut name = self.binary.as_os_str().to_os_string();
        name.push(format!(".{pid}"));
        PathBuf::from(name)
    }

    /// Private copy of the source compiled in place of the original
    pub fn scratch_source(&self, pid: u32) -> PathBuf {
        let mut name = self.binary.as_os_str().to_os_string();
        name.push(format!(".{pid}.go"));
        PathBuf::from(name)
    }
}

/// Flatten an absolute path into one file name
///
/// `%` becomes `%25` and `/` becomes `%2F`, which keeps the mapping
/// injective. Overlong results keep their tail behind a content hash.
pub fn escape_path(path: &Path) -> OsString {
    let mut escaped = b"ROOT".to_vec();
    for &byte in path.as_os_str().as_bytes() {
        match byte {
            b'%' => escaped.extend_from_slice(b"%25"),
            b'/' => escaped.extend_from_slice(b"%2F"),
            other => escaped.push(other),
        }
    }

    if escaped.len() > MAX_ESCAPED_LEN {
        let digest = Sha256::digest(path.as_os_str().as_bytes());
        let mut short = hex::encode(&digest[..6]).into_bytes();
        short.push(b'-');
        short.extend_from_slice(&escaped[escaped.len() - KEPT_TAIL_LEN..]);
        escaped = short;
    }

    OsString::from_vec(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn resolve_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("hello.go");
        fs::write(&real, "package main\n").unwrap();
        let link = dir.path().join("link.go");
        symlink(&real, &link).unwrap();

        let a = SourceUnit::resolve(&real).unwrap();
        let b = SourceUnit::resolve(&link).unwrap();

        assert_eq!(a.path, b.path);
        assert!(a.path.is_absolute());
        assert_eq!(a.file_name(), "hello.go");
    }

    #[test]
    fn resolve_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = SourceUnit::resolve(&dir.path().join("nope.go")).unwrap_err();
        assert!(matches!(err, GorunError::Resolution { .. }));
    }

    #[test]
    fn resolve_broken_link() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling.go");
        symlink(dir.path().join("gone.go"), &link).unwrap();

        let err = SourceUnit::resolve(&link).unwrap_err();
        assert!(matches!(err, GorunError::Resolution { .. }));
    }

    #[test]
    fn resolve_rejects_directory() {
        let dir = TempDir::new().unwrap();
        let err = SourceUnit::resolve(dir.path()).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn escape_is_flat() {
        let escaped = escape_path(Path::new("/home/user/bin/hello.go"));
        assert_eq!(escaped, "ROOT%2Fhome%2Fuser%2Fbin%2Fhello.go");
        assert!(!escaped.as_bytes().contains(&b'/'));
    }

    #[test]
    fn escape_keeps_nested_paths_apart() {
        // Paths that collide under naive separator replacement
        let a = escape_path(Path::new("/a_/b"));
        let b = escape_path(Path::new("/a/_b"));
        let c = escape_path(Path::new("/a%2Fb"));
        let d = escape_path(Path::new("/a/b"));
        assert_ne!(a, b);
        assert_ne!(c, d);
    }

    #[test]
    fn escape_shortens_long_paths() {
        let long = format!("/{}/main.go", "x".repeat(400));
        let escaped = escape_path(Path::new(&long));
        assert_eq!(escaped.len(), 12 + 1 + KEPT_TAIL_LEN);
        assert!(escaped.as_bytes().ends_with(b"main.go"));

        let other = format!("/{}/main.go", "y".repeat(400));
        assert_ne!(escaped, escape_path(Path::new(&other)));
    }

    #[test]
    fn entry_layout() {
        let source = SourceUnit {
            path: PathBuf::from("/src/hello.go"),
            modified: SystemTime::UNIX_EPOCH,
            mode: 0o644,
        };
        let entry = CacheEntry::for_source(Path::new("/cache"), &source);

        assert_eq!(entry.dir, PathBuf::from("/cache/ROOT%2Fsrc%2Fhello.go"));
        assert_eq!(entry.binary, entry.dir.join("hello.go.gorun"));
        assert_eq!(entry.temp_binary(42), entry.dir.join("hello.go.gorun.42"));
        assert_eq!(entry.scratch_source(42), entry.dir.join("hello.go.gorun.42.go"));
    }
}
