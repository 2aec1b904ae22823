// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `ipack`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ipack",
    version,
    about = "Bundle, compile and concatenate front-end assets for one project.",
    long_about = None
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `IPACK_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the JS bundle, the CSS bundle and every concat target.
    Build(BuildArgs),

    /// Change a global user setting (e.g. `package-manager npm`).
    Set {
        /// Setting key. One of: package-manager, mute-notification.
        key: String,
        /// New value for the key.
        value: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Minify outputs.
    #[arg(short, long)]
    pub production: bool,

    /// Keep running and rebuild JS / CSS on source changes.
    #[arg(short, long)]
    pub watch: bool,

    /// Serve artifacts from memory on this port instead of writing them to
    /// the output folder. Implies `--watch`.
    #[arg(long, value_name = "PORT")]
    pub serve: Option<u16>,

    /// Skip source maps for concatenation targets.
    #[arg(long)]
    pub no_source_map: bool,

    /// Print derived settings and concat targets, but build nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Project root. Defaults to the current working directory.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
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
