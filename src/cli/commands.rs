//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Lifecycle - drive remote resources through create, update and delete.
#[derive(Parser, Debug)]
#[command(name = "lifecycle")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "LIFECYCLE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Encode and decode resource handles.
    Handle {
        /// Handle subcommand.
        #[command(subcommand)]
        command: HandleCommands,
    },

    /// Compare two attribute or tag files.
    Diff {
        /// Diff subcommand.
        #[command(subcommand)]
        command: DiffCommands,
    },

    /// Run a full create, update, delete cycle against the simulated remote.
    Simulate {
        /// Desired attributes for the create (YAML or JSON).
        desired: PathBuf,

        /// Desired attributes for a follow-up update.
        #[arg(short, long)]
        update: Option<PathBuf>,

        /// Leave the resource in place instead of deleting it.
        #[arg(long)]
        keep: bool,

        /// Polls the simulated remote reports a transition status for.
        #[arg(long, default_value = "2")]
        transition_polls: usize,

        /// Let the create settle in FAILED.
        #[arg(long)]
        fail_create: bool,

        /// Poll interval in milliseconds.
        #[arg(long, default_value = "200")]
        poll_ms: u64,
    },

    /// Validate the engine configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },
}

/// Handle subcommands.
#[derive(Subcommand, Debug)]
pub enum HandleCommands {
    /// Join parts into a handle.
    Encode {
        /// Part names, e.g. `REST-API-ID,STAGE-NAME`.
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Separator placed between parts.
        #[arg(long, default_value = ",")]
        separator: char,

        /// Fall back to the `["a","b"]` form for parts containing the separator.
        #[arg(long)]
        array_literal: bool,

        /// Parts to encode.
        #[arg(required = true)]
        parts: Vec<String>,
    },

    /// Split a handle into its parts.
    Decode {
        /// Part names, e.g. `REST-API-ID,STAGE-NAME`.
        #[arg(long, value_delimiter = ',')]
        names: Vec<String>,

        /// Separator placed between parts.
        #[arg(long, default_value = ",")]
        separator: char,

        /// Accept the `["a","b"]` form.
        #[arg(long)]
        array_literal: bool,

        /// Handle to decode.
        handle: String,
    },

    /// Extract a resource name from an ARN handle.
    Arn {
        /// The ARN.
        arn: String,

        /// Resource-type prefix to strip, e.g. `domain/`.
        #[arg(long, default_value = "")]
        prefix: String,
    },
}

/// Diff subcommands.
#[derive(Subcommand, Debug)]
pub enum DiffCommands {
    /// Tags to create and remove, honoring the configured tag policy.
    Tags {
        /// Old tags (YAML or JSON mapping).
        old: PathBuf,
        /// New tags (YAML or JSON mapping).
        new: PathBuf,
    },

    /// Path-addressed patch operations.
    Patch {
        /// Old attributes.
        old: PathBuf,
        /// New attributes.
        new: PathBuf,

        /// Path prefix, e.g. `/properties`.
        #[arg(long, default_value = "")]
        prefix: String,
    },

    /// Keyed PUT/DELETE attribute updates.
    Attributes {
        /// Old attributes.
        old: PathBuf,
        /// New attributes.
        new: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}
