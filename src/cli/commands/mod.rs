//! CLI command implementations

pub mod completions;
pub mod manifest;
pub mod run;

pub use completions::execute as completions;
pub use run::execute as run;
