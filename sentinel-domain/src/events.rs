//! Gateway Events
//!
//! Typed events delivered by the broker gateway over the event feed.
//! Serializable so a recorded feed can be replayed line by line.

use crate::entities::{AccountValue, OrderStatusUpdate, PnlReading, Position};
use serde::{Deserialize, Serialize};

/// Events produced by a broker gateway session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// One position of the account (sent per contract, repeated on change)
    PositionUpdate(Position),

    /// End-of-snapshot marker for the position list
    PositionsComplete,

    /// Account PnL update
    PnlUpdate(PnlReading),

    /// One account-summary tag/value pair
    AccountSummary(AccountValue),

    /// Order status change for an order of this session
    OrderStatus(OrderStatusUpdate),

    /// Error or informational notice reported by the gateway
    GatewayError {
        /// Gateway error code
        code: i32,
        /// Human-readable message
        message: String,
    },
}

impl GatewayEvent {
    /// Short event name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::PositionUpdate(_) => "position_update",
            GatewayEvent::PositionsComplete => "positions_complete",
            GatewayEvent::PnlUpdate(_) => "pnl_update",
            GatewayEvent::AccountSummary(_) => "account_summary",
            GatewayEvent::OrderStatus(_) => "order_status",
            GatewayEvent::GatewayError { .. } => "gateway_error",
        }
    }
}
