use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::error::AppError;

const LOG_FILE_PREFIX: &str = "streamcheck.log";

/// Installs the global subscriber.
///
/// `-q` and `-v` pin the level to `error` and `debug`; otherwise `RUST_LOG`
/// applies, defaulting to `info`. With `log_dir` set, a daily-rotated file
/// layer is added; keep the returned guard alive until exit so buffered
/// lines are flushed.
pub fn init_logging(
    verbose: bool,
    quiet: bool,
    log_dir: Option<&Path>,
) -> Result<Option<WorkerGuard>, AppError> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::Logging(format!("cannot create log directory {}: {e}", dir.display()))
            })?;
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| AppError::Logging(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}
