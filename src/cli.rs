// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `extract-trigger`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "extract-trigger",
    version,
    about = "Trigger extract refreshes of datasources and workbooks on an analytics server.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `extract-trigger.toml` in the current working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EXTRACT_TRIGGER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Sign in, resolve and match every spec, print the plan, but start no jobs.
    #[arg(long)]
    pub dry_run: bool,

    /// Wait for the started jobs to finish (overrides `poll_mode = false`).
    #[arg(long)]
    pub poll: bool,

    /// Keep going when a spec fails (overrides `continue_on_error = false`).
    #[arg(long)]
    pub continue_on_error: bool,
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
