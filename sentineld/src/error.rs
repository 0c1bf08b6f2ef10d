//! Daemon error types.

use sentinel_exec::ExecError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Gateway session could not be established (after all attempts)
    #[error("Connection failed after {attempts} attempt(s): {source}")]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: ExecError,
    },

    /// No account to subscribe PnL for
    #[error("No account available: {0}")]
    NoAccount(String),

    /// Readiness gates did not open in time
    #[error("Readiness timeout after {secs}s (pending: {pending})")]
    ReadinessTimeout { secs: u64, pending: String },

    /// Event feed ended before liquidation
    #[error("Gateway event feed closed")]
    FeedClosed,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
