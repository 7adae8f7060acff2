//! Tooling & Integration Layer
//!
//! Command-line entry points over the reconciliation engine.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
