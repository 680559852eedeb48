//! External Go toolchain
//!
//! The toolchain is an opaque collaborator: it gets a source file and an
//! output path, prints its own diagnostics, and reports success or failure.

use crate::config::ToolchainConfig;
use crate::error::{GorunError, GorunResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Well-known Go installation path
const DEFAULT_GO_ROOT: &str = "/usr/local/go";

/// A single build invocation
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    /// Source file to compile
    pub source: &'a Path,
    /// Where the executable must be written
    pub output: &'a Path,
    /// Working directory, if the build must run somewhere specific
    pub work_dir: Option<&'a Path>,
    /// Variables layered onto the inherited environment
    pub env: &'a [(String, String)],
}

/// Something that turns a source file into an executable
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Build `request.source` into `request.output`
    async fn build(&self, request: &BuildRequest<'_>) -> GorunResult<()>;

    /// Human-readable toolchain name for logs
    fn name(&self) -> &str;
}

/// The `go build` toolchain
#[derive(Debug, Clone, Default)]
pub struct GoToolchain {
    go_root: Option<PathBuf>,
    build_flags: Vec<String>,
}

impl GoToolchain {
    /// Create a toolchain from configuration
    pub fn new(config: &ToolchainConfig) -> Self {
        Self {
            go_root: config.go_root.clone(),
            build_flags: config.build_flags.clone(),
        }
    }

    /// Find the `go` binary
    ///
    /// Installation roots are tried first (configured, `$GOROOT`, then the
    /// well-known default), falling back to a `PATH` search.
    pub fn locate(&self) -> GorunResult<PathBuf> {
        let roots = self
            .go_root
            .clone()
            .into_iter()
            .chain(std::env::var_os("GOROOT").map(PathBuf::from))
            .chain(std::iter::once(PathBuf::from(DEFAULT_GO_ROOT)));

        for root in roots {
            let candidate = root.join("bin").join("go");
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        which::which("go").map_err(|_| GorunError::ToolchainNotFound)
    }
}

#[async_trait]
impl Toolchain for GoToolchain {
    async fn build(&self, request: &BuildRequest<'_>) -> GorunResult<()> {
        let go = self.locate()?;

        let mut cmd = Command::new(&go);
        cmd.arg("build")
            .args(&self.build_flags)
            .arg("-o")
            .arg(request.output)
            .arg(request.source)
            .envs(request.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = request.work_dir {
            cmd.current_dir(dir);
        }

        debug!("Executing: {} build -o {}", go.display(), request.output.display());
        let status = cmd.status().await.map_err(|e| GorunError::Build {
            tool: "go".to_string(),
            reason: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(GorunError::Build {
                tool: "go".to_string(),
                reason: status.to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        "go"
    }
}
