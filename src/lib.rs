//! gorun - Script-like runner for Go source files
//!
//! Compiles a Go source file once into a per-user, per-host cache and
//! replaces the current process with the cached binary on every run.

pub mod build;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod manifest;
pub mod runner;

pub use error::{GorunError, GorunResult};
