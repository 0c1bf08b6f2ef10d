//! Execution layer port definitions.
//!
//! Ports define the interfaces for external services (broker gateway,
//! close notifications). Adapters implement these ports for specific
//! services (stub, replay file, HTTP webhook).

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use sentinel_domain::{AccountId, GatewayEvent, MarketOrder, OrderAck, Position, SecurityType, Symbol};

use crate::error::ExecError;

/// Capacity of the gateway → monitor event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Receiving half of the gateway event feed
pub type EventStream = mpsc::Receiver<GatewayEvent>;

// =============================================================================
// Gateway Endpoint
// =============================================================================

/// Where the broker gateway listens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayEndpoint {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
}

impl GatewayEndpoint {
    pub fn new(host: impl Into<String>, port: u16, client_id: i32) -> Self {
        Self { host: host.into(), port, client_id }
    }
}

impl Default for GatewayEndpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", 4002, 2)
    }
}

impl fmt::Display for GatewayEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} (client {})", self.host, self.port, self.client_id)
    }
}

// =============================================================================
// Broker Gateway Port
// =============================================================================

/// Port for the broker gateway session.
///
/// Implementations:
/// - `StubGateway` - For testing (scripted events, recorded orders)
/// - `ReplayGateway` - Recorded JSON-lines feed, orders acknowledged on paper
///
/// Events requested by the `request_*` methods arrive on the [`EventStream`]
/// returned by [`connect`](BrokerGateway::connect), in gateway order.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Establish the session and hand back the event feed.
    ///
    /// # Errors
    ///
    /// `ExecError::Connection` if the gateway is unreachable.
    async fn connect(&self, endpoint: &GatewayEndpoint) -> Result<EventStream, ExecError>;

    /// Accounts managed by this session
    async fn managed_accounts(&self) -> Result<Vec<AccountId>, ExecError>;

    /// Request all open orders (status arrives as `OrderStatus` events)
    async fn request_open_orders(&self) -> Result<(), ExecError>;

    /// Request the position list, terminated by `PositionsComplete`
    async fn request_positions(&self) -> Result<(), ExecError>;

    /// Subscribe to account summary values
    async fn request_account_summary(&self) -> Result<(), ExecError>;

    /// Subscribe to account PnL updates
    async fn request_pnl(&self, account: &str) -> Result<(), ExecError>;

    /// Place a market order.
    ///
    /// # Returns
    ///
    /// `OrderAck` once the gateway accepted the order. Fills are reported
    /// asynchronously on the event feed.
    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderAck, ExecError>;

    /// Cancel every resting order of the session
    async fn global_cancel(&self) -> Result<(), ExecError>;

    /// Close the session
    async fn disconnect(&self) -> Result<(), ExecError>;
}

// =============================================================================
// Notifier Port
// =============================================================================

/// Announcement that a position is being closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloseNotice {
    pub symbol: Symbol,
    /// Signed position size at the time of liquidation
    pub quantity: Decimal,
    /// Average cost of the position
    pub last_price: Decimal,
    pub security_type: SecurityType,
    pub at: DateTime<Utc>,
}

impl CloseNotice {
    pub fn for_position(position: &Position) -> Self {
        Self {
            symbol: position.symbol().clone(),
            quantity: position.quantity,
            last_price: position.avg_cost,
            security_type: position.contract.security_type,
            at: Utc::now(),
        }
    }
}

/// Port for close notifications (e.g., trading-bot webhook).
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver one close notice.
    ///
    /// # Errors
    ///
    /// `ExecError::Notification` on timeout, transport failure or non-2xx.
    async fn notify_close(&self, notice: &CloseNotice) -> Result<(), ExecError>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_domain::{Contract, ContractId};

    #[test]
    fn test_default_endpoint() {
        let endpoint = GatewayEndpoint::default();
        assert_eq!(endpoint.port, 4002);
        assert_eq!(endpoint.to_string(), "127.0.0.1:4002 (client 2)");
    }

    #[test]
    fn test_close_notice_from_short_position() {
        let position = Position::new(
            "DU000001",
            Contract::stock(ContractId(272093), Symbol::new("MSFT").unwrap()),
            dec!(-50),
            dec!(410.25),
        );

        let notice = CloseNotice::for_position(&position);

        assert_eq!(notice.symbol.as_str(), "MSFT");
        assert_eq!(notice.quantity, dec!(-50));
        assert_eq!(notice.last_price, dec!(410.25));
        assert_eq!(notice.security_type, SecurityType::Stock);
    }
}
