//! Sentinel Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes gateway events → Returns actions to execute.
//!
//! - [`threshold`]: loss limit modes and the breach check
//! - [`readiness`]: gates that must open before PnL is evaluated
//! - [`liquidation`]: closing orders for a position snapshot
//! - [`guard`]: the state machine tying them together

#![warn(clippy::all)]

pub mod guard;
pub mod liquidation;
pub mod readiness;
pub mod threshold;

pub use guard::{GuardAction, LossGuard, MonitorState};
pub use liquidation::LiquidationPlan;
pub use readiness::{ReadinessGate, ReadinessGates};
pub use threshold::{breached, check, ThresholdCheck, ThresholdConfig, ThresholdMode, ThresholdPolicy};
