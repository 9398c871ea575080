use std::path::Path;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::DeployConfig;

const DEFAULT_FILTER: &str = "info,cwdeploy_core=debug,cwdeploy_chain=debug,contract_setup=debug";

/// Prefix of the daily log files, e.g. `cwdeploy.2026-10-16`.
const LOG_FILE_PREFIX: &str = "cwdeploy";

/// Log to `~/.cwdeploy/logs` and to stderr.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
/// `RUST_LOG` overrides the default filter.
pub fn init_logging() -> Result<WorkerGuard> {
    init_logging_in(&DeployConfig::logs_dir()?, DEFAULT_FILTER, true)
}

/// Log to daily files in `logs_dir`, and to stderr when `console` is set.
pub fn init_logging_in(logs_dir: &Path, default_filter: &str, console: bool) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let console_layer = console.then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(guard)
}
