//! Tracing setup: console output plus an optional daily-rolling log file.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;
use crate::error::{DaemonError, DaemonResult};

/// Log file prefix inside `SENTINEL_LOG_DIR`
pub const LOG_FILE_PREFIX: &str = "sentinel.log";

/// Filter used when `RUST_LOG` is unset: every workspace crate at info
pub const DEFAULT_DIRECTIVES: &str =
    "sentineld=info,sentinel_engine=info,sentinel_exec=info,sentinel_connectors=info";

/// Build the event filter from a `RUST_LOG` value, falling back to
/// [`DEFAULT_DIRECTIVES`] when it is unset or blank.
///
/// # Errors
///
/// `DaemonError::Logging` if the directives do not parse.
pub fn filter(rust_log: Option<&str>) -> DaemonResult<EnvFilter> {
    let directives = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DIRECTIVES);

    EnvFilter::try_new(directives)
        .map_err(|e| DaemonError::Logging(format!("Invalid directives {:?}: {}", directives, e)))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; hold it for the
/// lifetime of `main`.
///
/// # Errors
///
/// `DaemonError::Logging` if a subscriber is already installed or
/// `RUST_LOG` does not parse.
pub fn init(config: &LogConfig) -> DaemonResult<Option<WorkerGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter(rust_log.as_deref())?;

    let (file_layer, guard) = match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| DaemonError::Logging(e.to_string()))?;

    Ok(guard)
}
