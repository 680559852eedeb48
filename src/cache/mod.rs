//! Compilation cache for Go source files
//!
//! The cache is a plain directory tree shared by every gorun process of a
//! user on a host. There is no lock: binaries are published with an atomic
//! rename and expired with whole-directory removal, so readers only ever see
//! a complete binary or none at all.
//!
//! # Layout
//!
//! ```text
//! <temp>/gorun-<host>-<euid>[-<n>]/<os>_<arch>/    cache root (0700, owned by euid)
//!     last-cleaned                                 time of the last sweep
//!     ROOT%2Fhome%2Fme%2Fhello.go/                 one directory per source
//!         hello.go.gorun                           published binary
//!         go.mod, go.sum                           extracted build inputs
//! ```
//!
//! # Entry lifecycle
//!
//! | State | Description |
//! |-------|-------------|
//! | Missing | No binary published yet |
//! | Building | Written under a pid-qualified temporary name |
//! | Fresh | Renamed into place, mtime pinned to the source mtime |
//! | Stale | Source is newer, or owner bits were relaxed |
//! | Expired | Directory not accessed within the retention window |

pub mod freshness;
pub mod root;
pub mod source;
pub mod sweep;

pub use freshness::{Freshness, StaleReason};
pub use root::{CacheRoot, Identity, RootGuard};
pub use source::{CacheEntry, SourceUnit};
pub use sweep::{sweep, SweepOutcome};
