//! Sentinel Connectors
//!
//! Adapters for the execution ports:
//! - [`webhook`]: HTTP close notifications (`NotifierPort`)
//! - [`replay`]: recorded gateway session (`BrokerGateway`)

#![warn(clippy::all)]

// Public modules
pub mod replay;
pub mod webhook;

// Re-exports
pub use replay::{parse_line, ReplayGateway};
pub use webhook::{Metric, WebhookNotifier, WebhookPayload, CLOSE_ALL_QTY_SENTINEL};
