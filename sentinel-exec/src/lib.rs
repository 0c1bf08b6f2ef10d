//! Sentinel Execution Layer
//!
//! Gateway and notifier ports, plus the liquidation sequence.
//!
//! # Architecture
//!
//! ```text
//! LossGuard decision → Liquidator → BrokerGateway (orders, global cancel)
//!                                 → NotifierPort (close notices)
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits defining the broker gateway and notifier interfaces
//! - **Liquidator**: Executes a liquidation plan, never stopping on a failed order
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use sentinel_exec::{Liquidator, StubGateway};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(StubGateway::new("DU000001"));
//! let liquidator = Liquidator::new(gateway);
//!
//! let report = liquidator.execute(&plan, &book).await;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod liquidator;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use error::ExecError;
pub use liquidator::{FailedOrder, LiquidationReport, Liquidator};
pub use ports::{
    BrokerGateway, CloseNotice, EventStream, GatewayEndpoint, NotifierPort, EVENT_CHANNEL_CAPACITY,
};
pub use stub::{StubGateway, StubNotifier};
