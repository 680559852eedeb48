//! Completions command - print a shell completion script

use crate::cli::Cli;
use clap::CommandFactory;
use clap_complete::Shell;
use std::io;

/// Write the completion script for `shell` to stdout
pub fn execute(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "gorun", &mut io::stdout());
}
