// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! The binary is a thin shell: every subcommand maps onto one engine call.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `taskgraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskgraph",
    version,
    about = "Persistent task queue with dependency tracking.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Taskgraph.toml` in the current working directory. A missing
    /// file means built-in defaults.
    #[arg(long, value_name = "PATH", default_value = "Taskgraph.toml")]
    pub config: PathBuf,

    /// Override `[storage] path` from the config.
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print results as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Enqueue a new task.
    Add(AddArgs),
    /// Mark a ready task as running.
    Start { id: String },
    /// Mark a running task as completed.
    Complete { id: String },
    /// Mark a running task as failed.
    Fail {
        id: String,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Cancel a pending, ready or running task.
    Cancel { id: String },
    /// Re-ready a blocked task whose prerequisites no longer block it.
    Unblock { id: String },
    /// Make DEPENDENT wait for PREREQUISITE.
    Depend {
        dependent: String,
        prerequisite: String,
        /// Replace this existing prerequisite instead of adding a new edge.
        #[arg(long, value_name = "OLD")]
        replace: Option<String>,
    },
    /// Remove the edge DEPENDENT -> PREREQUISITE.
    Undepend {
        dependent: String,
        prerequisite: String,
    },
    /// List tasks matching a filter.
    List(FilterArgs),
    /// Show one task and its history.
    Show { id: String },
    /// Prerequisites of a task, transitively.
    Ancestors(DepthArgs),
    /// Dependents of a task, transitively.
    Descendants(DepthArgs),
    /// Longest duration-weighted path from a task down to a leaf.
    CriticalPath { id: String },
    /// Tasks with no dependency edges at all.
    Orphans,
    /// Tasks nothing depends on.
    Leaves,
    /// Render the dependents of a task as a tree.
    Tree(DepthArgs),
    /// Archive and delete finished tasks matching a filter.
    Prune {
        #[command(flatten)]
        filter: FilterArgs,
        /// Include every descendant of each matched task.
        #[arg(long)]
        recursive: bool,
        /// Only show what would be deleted.
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate an archive file.
    Verify { path: PathBuf },
}

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    pub description: String,
    #[arg(long)]
    pub agent_type: String,
    #[arg(long, default_value = "cli")]
    pub source: String,
    /// Prerequisite task id; may be repeated.
    #[arg(long = "after", value_name = "ID")]
    pub after: Vec<String>,
    #[arg(long)]
    pub summary: Option<String>,
    #[arg(long)]
    pub feature_branch: Option<String>,
    /// Estimated duration in milliseconds.
    #[arg(long, value_name = "MS")]
    pub estimate_ms: Option<u64>,
    #[arg(long)]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Comma-separated statuses, e.g. `completed,failed`.
    #[arg(long)]
    pub status: Option<String>,
    #[arg(long)]
    pub agent_type: Option<String>,
    #[arg(long)]
    pub feature_branch: Option<String>,
    /// Case-insensitive search over description and summary.
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct DepthArgs {
    pub id: String,
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub max_depth: Option<i64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
