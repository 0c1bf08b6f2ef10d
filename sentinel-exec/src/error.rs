//! Execution layer error types.

use thiserror::Error;

/// Errors that can occur during gateway and notification operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Session could not be established
    #[error("Connection error: {0}")]
    Connection(String),

    /// A data subscription request failed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Order was rejected by the gateway
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Gateway communication error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Close notification could not be delivered (timeout, transport, non-2xx)
    #[error("Notification error: {0}")]
    Notification(String),
}
