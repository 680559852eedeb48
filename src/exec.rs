//! Process handoff
//!
//! Running a cached binary replaces the gorun process image; on success
//! nothing returns. The `Launcher` trait keeps that step swappable so the
//! surrounding retry logic can be exercised without leaving the process.

use std::convert::Infallible;
use std::ffi::OsString;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Hands control over to a compiled binary
pub trait Launcher {
    /// What a successful launch yields; uninhabited for a real exec
    type Handoff;

    /// Start `program` with `args`, where `args[0]` becomes argv\[0\]
    fn launch(&self, program: &Path, args: &[OsString]) -> io::Result<Self::Handoff>;
}

/// Replaces the current process image via `execvp`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecLauncher;

impl Launcher for ExecLauncher {
    type Handoff = Infallible;

    fn launch(&self, program: &Path, args: &[OsString]) -> io::Result<Infallible> {
        let mut cmd = Command::new(program);
        if let Some((arg0, rest)) = args.split_first() {
            cmd.arg0(arg0).args(rest);
        }
        debug!("Executing {} as {:?}", program.display(), args.first());
        // The environment is inherited unchanged
        Err(cmd.exec())
    }
}
