//! Error types for gorun
//!
//! All modules use `GorunResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for gorun operations
pub type GorunResult<T> = Result<T, GorunError>;

/// All errors that can occur in gorun
#[derive(Error, Debug)]
pub enum GorunError {
    // Source resolution
    #[error("Failed to resolve source file {path}: {reason}")]
    Resolution { path: PathBuf, reason: String },

    // Environment errors
    #[error("Untrustworthy cache environment: {0}")]
    Environment(String),

    #[error("Cache entry is not a regular file: {0}")]
    Integrity(PathBuf),

    // Toolchain errors
    #[error("Can't find go tool")]
    ToolchainNotFound,

    #[error("Failed to run {tool}: {reason}")]
    Build { tool: String, reason: String },

    // Handoff errors
    #[error("Cached binary {path} kept disappearing after {attempts} attempts")]
    VanishedArtifact {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to execute {path}: {source}")]
    Exec {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid embed ignore pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Embedded manifests differ from the files on disk")]
    ManifestDrift,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    User(String),
}

impl GorunError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a source resolution error
    pub fn resolution(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Resolution {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if error is retryable
    ///
    /// Only a binary removed between the freshness check and the handoff
    /// is worth another compile-and-execute cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VanishedArtifact { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolchainNotFound => {
                Some("Install Go, set GOROOT, or set toolchain.go_root in the gorun config")
            }
            Self::Integrity(_) => Some("Inspect the path and remove it manually if it is safe"),
            Self::Environment(_) => Some("Set cache.temp_dir in the gorun config to a private directory"),
            Self::ManifestDrift => Some("Run: gorun --embed <source> or gorun --extract <source>"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = GorunError::ToolchainNotFound;
        assert_eq!(err.to_string(), "Can't find go tool");

        let err = GorunError::Integrity(PathBuf::from("/tmp/x/hello.go.gorun"));
        assert!(err.to_string().contains("not a regular file"));
    }

    #[test]
    fn error_hint() {
        assert!(GorunError::ToolchainNotFound.hint().is_some());
        assert_eq!(GorunError::User("x".into()).hint(), None);
    }

    #[test]
    fn error_retryable() {
        let vanished = GorunError::VanishedArtifact {
            path: PathBuf::from("/tmp/a"),
            attempts: 3,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(vanished.is_retryable());

        let exec = GorunError::Exec {
            path: PathBuf::from("/tmp/a"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!exec.is_retryable());
        assert!(!GorunError::ToolchainNotFound.is_retryable());
    }
}
