//! CLI module for the release deployment tool.
//!
//! This module provides the command-line interface for planning and
//! running releases.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
