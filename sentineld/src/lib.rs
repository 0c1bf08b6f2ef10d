//! Sentinel Daemon Library
//!
//! Runtime orchestrator for the PnL liquidation guard.
//!
//! # Architecture
//!
//! ```text
//! BrokerGateway ──events──▶ LiquidationMonitor ──▶ LossGuard (pure)
//!       ▲                          │
//!       └──── orders, cancel ── Liquidator ──▶ NotifierPort (webhook)
//! ```
//!
//! # Components
//!
//! - **Daemon**: Builds the gateway and notifier, runs the monitor
//! - **Liquidation Monitor**: Connect, subscribe, receive-and-dispatch loop
//! - **Config**: Environment-based configuration
//! - **Logging**: Console and rolling-file tracing output
//!
//! # Example
//!
//! ```rust,ignore
//! use sentineld::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::from_env().expect("Failed to load config");
//!     let daemon = Daemon::new(config);
//!     daemon.run().await.expect("Daemon error");
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod monitor;

// Re-exports for convenience
pub use config::{
    Config, Environment, GatewayConfig, GatewayKind, LogConfig, LossUnit, MonitorConfig, WebhookConfig,
};
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use monitor::{LiquidationMonitor, MonitorOutcome};
