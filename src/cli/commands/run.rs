//! Run command - compile if needed and hand off to the binary

use crate::build::{Builder, GoToolchain};
use crate::cache::{Identity, RootGuard};
use crate::config::Config;
use crate::error::GorunResult;
use crate::exec::ExecLauncher;
use crate::runner::Runner;
use std::convert::Infallible;
use std::ffi::OsString;
use tracing::debug;

/// Execute the run command
///
/// `program[0]` is the source file; the whole vector becomes the program's
/// argument list. Never returns on success.
pub async fn execute(program: &[OsString], config: &Config) -> GorunResult<Infallible> {
    let temp_root = config.cache.temp_root();
    debug!("Temp root: {}", temp_root.display());

    let guard = RootGuard::new(temp_root, Identity::current()?)
        .with_max_attempts(config.cache.max_root_attempts);

    let toolchain = GoToolchain::new(&config.toolchain);
    let builder = Builder::new(&toolchain).with_env(
        config
            .toolchain
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );

    Runner::new(guard, builder, ExecLauncher, config.cache.retention())
        .run(program)
        .await
}
