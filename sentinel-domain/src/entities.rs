//! Domain Entities for Sentinel
//!
//! Plain records describing what the broker gateway reports (contracts,
//! positions, PnL, account values) and what the guard sends back (orders).

use crate::value_objects::{ContractId, OrderSide, Quantity, SecurityType, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Broker account identifier (e.g., "DU1234567")
pub type AccountId = String;

/// Broker-assigned order identifier
pub type OrderId = i64;

/// Order reference attached to every liquidation order
pub const CLOSE_ALL_ORDER_REF: &str = "close_all";

// =============================================================================
// Contract
// =============================================================================

/// A tradable instrument as identified by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    /// Broker contract identifier
    pub id: ContractId,
    /// Exchange ticker
    pub symbol: Symbol,
    /// Instrument class
    #[serde(default)]
    pub security_type: SecurityType,
    /// Trading currency
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Routing exchange
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_exchange() -> String {
    "SMART".to_string()
}

impl Contract {
    /// US stock routed through SMART
    pub fn stock(id: ContractId, symbol: Symbol) -> Self {
        Self {
            id,
            symbol,
            security_type: SecurityType::Stock,
            currency: default_currency(),
            exchange: default_exchange(),
        }
    }
}

// =============================================================================
// Position
// =============================================================================

/// A held quantity of a contract
///
/// Quantity is signed: positive = long, negative = short, zero = flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub account: AccountId,
    pub contract: Contract,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
}

impl Position {
    /// Create a position record
    pub fn new(account: impl Into<AccountId>, contract: Contract, quantity: Decimal, avg_cost: Decimal) -> Self {
        Self {
            account: account.into(),
            contract,
            quantity,
            avg_cost,
        }
    }

    /// Contract identifier (position book key)
    pub fn contract_id(&self) -> ContractId {
        self.contract.id
    }

    /// Ticker of the held contract
    pub fn symbol(&self) -> &Symbol {
        &self.contract.symbol
    }

    /// True when nothing is held
    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// True for a positive quantity
    pub fn is_long(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    /// Side of the order that would flatten this position
    pub fn closing_side(&self) -> Option<OrderSide> {
        OrderSide::closing(self.quantity)
    }

    /// Size of the order that would flatten this position
    pub fn closing_quantity(&self) -> Option<Quantity> {
        Quantity::new(self.quantity.abs()).ok()
    }
}

// =============================================================================
// PnL Reading
// =============================================================================

/// Account-level profit and loss snapshot
///
/// Transient: each reading replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlReading {
    pub daily_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    /// Account equity (net liquidation) when the broker supplies it
    #[serde(default)]
    pub equity: Option<Decimal>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl PnlReading {
    /// Reading with daily/unrealized/realized components and no equity
    pub fn new(daily_pnl: Decimal, unrealized_pnl: Decimal, realized_pnl: Decimal) -> Self {
        Self {
            daily_pnl,
            unrealized_pnl,
            realized_pnl,
            equity: None,
            received_at: Utc::now(),
        }
    }

    /// Reading carrying only a daily PnL figure
    pub fn daily(daily_pnl: Decimal) -> Self {
        Self::new(daily_pnl, Decimal::ZERO, Decimal::ZERO)
    }

    /// Attach an account equity value
    pub fn with_equity(mut self, equity: Decimal) -> Self {
        self.equity = Some(equity);
        self
    }
}

// =============================================================================
// Account Value
// =============================================================================

/// One account-summary entry (tag/value pair)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountValue {
    pub account: AccountId,
    pub tag: String,
    pub value: String,
    #[serde(default)]
    pub currency: Option<String>,
}

impl AccountValue {
    /// Tag carrying the account's net liquidation value (equity)
    pub const NET_LIQUIDATION: &'static str = "NetLiquidation";

    /// Create an account-summary entry
    pub fn new(account: impl Into<AccountId>, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            tag: tag.into(),
            value: value.into(),
            currency: None,
        }
    }

    /// Numeric value, if the entry is numeric
    pub fn as_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(self.value.trim()).ok()
    }

    /// Equity carried by a `NetLiquidation` entry
    pub fn net_liquidation(&self) -> Option<Decimal> {
        if self.tag == Self::NET_LIQUIDATION {
            self.as_decimal()
        } else {
            None
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Market order sent to the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub contract: Contract,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub order_ref: String,
}

impl MarketOrder {
    /// Order that flattens `position`; `None` for a flat position
    pub fn closing(position: &Position) -> Option<Self> {
        let side = position.closing_side()?;
        let quantity = position.closing_quantity()?;
        Some(Self {
            contract: position.contract.clone(),
            side,
            quantity,
            order_ref: CLOSE_ALL_ORDER_REF.to_string(),
        })
    }

    /// Ticker of the ordered contract
    pub fn symbol(&self) -> &Symbol {
        &self.contract.symbol
    }
}

/// Broker acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub contract_id: ContractId,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub submitted_at: DateTime<Utc>,
}

impl OrderAck {
    /// Acknowledge `order` under `order_id`
    pub fn for_order(order_id: OrderId, order: &MarketOrder) -> Self {
        Self {
            order_id,
            contract_id: order.contract.id,
            symbol: order.contract.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            submitted_at: Utc::now(),
        }
    }
}

/// Asynchronous order status report from the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub order_id: OrderId,
    pub status: String,
    #[serde(default)]
    pub filled: Decimal,
    #[serde(default)]
    pub remaining: Decimal,
    #[serde(default)]
    pub avg_fill_price: Decimal,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, quantity: Decimal) -> Position {
        Position::new(
            "DU000001",
            Contract::stock(ContractId(1), Symbol::new(symbol).unwrap()),
            quantity,
            dec!(150.25),
        )
    }

    #[test]
    fn test_long_position_closes_with_sell() {
        let pos = position("AAPL", dec!(100));
        assert!(pos.is_long());
        assert_eq!(pos.closing_side(), Some(OrderSide::Sell));
        assert_eq!(pos.closing_quantity().unwrap().as_decimal(), dec!(100));
    }

    #[test]
    fn test_short_position_closes_with_buy_of_absolute_size() {
        let pos = position("MSFT", dec!(-50));
        assert!(!pos.is_long());
        assert_eq!(pos.closing_side(), Some(OrderSide::Buy));
        assert_eq!(pos.closing_quantity().unwrap().as_decimal(), dec!(50));
    }

    #[test]
    fn test_flat_position_has_no_closing_order() {
        let pos = position("TSLA", Decimal::ZERO);
        assert!(pos.is_flat());
        assert!(MarketOrder::closing(&pos).is_none());
    }

    #[test]
    fn test_closing_market_order_carries_order_ref() {
        let order = MarketOrder::closing(&position("AAPL", dec!(10))).unwrap();
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.order_ref, CLOSE_ALL_ORDER_REF);
        assert_eq!(order.symbol().as_str(), "AAPL");
    }

    #[test]
    fn test_account_value_net_liquidation() {
        let value = AccountValue::new("DU000001", AccountValue::NET_LIQUIDATION, "30125.50");
        assert_eq!(value.net_liquidation(), Some(dec!(30125.50)));

        let other = AccountValue::new("DU000001", "AccountType", "INDIVIDUAL");
        assert_eq!(other.as_decimal(), None);
        assert_eq!(other.net_liquidation(), None);
    }

    #[test]
    fn test_contract_defaults_when_deserializing() {
        let contract: Contract = serde_json::from_str(r#"{"id": 265598, "symbol": "AAPL"}"#).unwrap();
        assert_eq!(contract.currency, "USD");
        assert_eq!(contract.exchange, "SMART");
        assert_eq!(contract.security_type, SecurityType::Stock);
    }
}
