//! CLI module for the lifecycle tool.
//!
//! Commands for inspecting handles and diffs, validating configuration and
//! running a resource through its lifecycle on the simulated remote.

mod commands;
mod output;

pub use commands::{Cli, Commands, DiffCommands, HandleCommands, OutputFormat};
pub use output::OutputFormatter;
