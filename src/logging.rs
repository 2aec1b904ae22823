// src/logging.rs

//! `tracing` subscriber for the binary.
//!
//! The filter comes from `--log-level` when given, else from `IPACK_LOG`
//! (full `EnvFilter` syntax, e.g. `info,ipack::pipeline=debug`), else
//! `info`. The watcher backend is capped at `warn` unless a directive
//! names it.
//!
//! Logs go to stderr; stdout is reserved for `--dry-run` output.

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "IPACK_LOG";

const QUIET_DEPENDENCIES: &[&str] = &["notify=warn", "notify_debouncer_full=warn", "globset=warn"];

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the filter for a run. `env` is the value of [`LOG_ENV`], if set.
pub fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    let base = match (cli_level, env.map(str::trim).filter(|s| !s.is_empty())) {
        (Some(level), _) => LevelFilter::from(level).to_string(),
        (None, Some(directives)) => directives.to_string(),
        (None, None) => LevelFilter::INFO.to_string(),
    };

    let mut directives = vec![base.clone()];
    for quiet in QUIET_DEPENDENCIES {
        let crate_name = quiet.split('=').next().unwrap_or_default();
        if !base.contains(crate_name) {
            directives.push((*quiet).to_string());
        }
    }

    EnvFilter::builder()
        .parse(directives.join(","))
        .with_context(|| format!("invalid log filter '{base}' (from --log-level or {LOG_ENV})"))
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing the log subscriber: {e}"))
}
