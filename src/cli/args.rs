//! CLI argument definitions using clap derive

use crate::manifest::DEFAULT_EMBED_IGNORE;
use clap::{ArgAction, Parser};
use clap_complete::Shell;
use std::ffi::OsString;
use std::path::PathBuf;

/// Environment variable holding extra gorun options
pub const ARGS_ENV: &str = "GORUN_ARGS";

/// gorun - Compile and run a Go program directly
///
/// The binary is cached per user and host and only rebuilt when the source
/// changes. Options can also be provided via the GORUN_ARGS environment
/// variable.
#[derive(Parser, Debug)]
#[command(name = "gorun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "GORUN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Show diff between embedded comments and filesystem go.mod/go.sum
    #[arg(long)]
    pub diff: bool,

    /// Embed filesystem go.mod/go.sum as comments in the source file
    #[arg(long)]
    pub embed: bool,

    /// Extract the embedded comments to filesystem go.mod/go.sum
    #[arg(long)]
    pub extract: bool,

    /// Do not embed if the source path matches this regex
    #[arg(long, default_value = DEFAULT_EMBED_IGNORE)]
    pub embed_ignore_regex: String,

    /// Don't compile or run the program
    #[arg(long)]
    pub no_run: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,

    /// Source file, followed by the arguments passed to the program
    #[arg(
        value_name = "SOURCE",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required_unless_present = "completions"
    )]
    pub program: Vec<OsString>,
}

impl Cli {
    /// Parse the process arguments, honouring `GORUN_ARGS`
    pub fn parse_with_env() -> Self {
        let extra = std::env::var(ARGS_ENV).ok();
        Self::parse_from(merge_env_args(extra.as_deref(), std::env::args_os()))
    }

    /// Whether any manifest action was requested
    pub fn has_manifest_action(&self) -> bool {
        self.diff || self.embed || self.extract
    }
}

/// Insert whitespace-separated options from `extra` right after argv\[0\]
pub fn merge_env_args(
    extra: Option<&str>,
    argv: impl IntoIterator<Item = OsString>,
) -> Vec<OsString> {
    let mut argv = argv.into_iter();
    argv.next()
        .into_iter()
        .chain(
            extra
                .unwrap_or_default()
                .split_whitespace()
                .map(OsString::from),
        )
        .chain(argv)
        .collect()
}
