// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `plandag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "plandag",
    version,
    about = "Build job graphs and catalogs for a batch workflow engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PLANDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build and finalize the multiply/sort/add demo workflow.
    Example {
        /// Config file (TOML). Defaults to `Plandag.toml` when present;
        /// without any, jobs run on the local host.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Workflow directory; overrides `[workflow].directory`.
        #[arg(long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Purge checkpoints without asking if nothing would run.
        #[arg(long, conflicts_with = "no")]
        yes: bool,

        /// Keep checkpoints without asking if nothing would run.
        #[arg(long)]
        no: bool,
    },

    /// Delete every checkpoint file under a directory.
    PurgeCheckpoints {
        #[arg(value_name = "ROOT")]
        root: PathBuf,
    },
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

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
