//! Value Objects for the Sentinel Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Symbol must be a non-empty ticker
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Threshold configuration validation error
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity represents a positive order size
///
/// Position sizes are signed and live on [`crate::Position`]; order sizes are
/// always expressed as a positive quantity plus an [`OrderSide`].
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(Decimal);

impl Quantity {
    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity("Quantity must be positive".to_string()));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol represents an exchange ticker (e.g., AAPL)
///
/// # Invariants
/// - Non-empty after trimming
/// - No embedded whitespace
/// - Stored upper-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol from a ticker string
    ///
    /// # Examples
    /// ```
    /// # use sentinel_domain::value_objects::Symbol;
    /// let symbol = Symbol::new(" aapl ").unwrap();
    /// assert_eq!(symbol.as_str(), "AAPL");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the ticker is empty or contains whitespace
    pub fn new(ticker: &str) -> Result<Self, DomainError> {
        let trimmed = ticker.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidSymbol("Ticker must be non-empty".to_string()));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidSymbol(format!(
                "Ticker must not contain whitespace: {}",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_uppercase()))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ContractId
// =============================================================================

/// Broker-assigned contract identifier (unique per tradable instrument)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(pub i64);

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// OrderSide
// =============================================================================

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// Side of the order that flattens a signed position
    ///
    /// Long (positive) → Sell, Short (negative) → Buy, flat → None
    pub fn closing(quantity: Decimal) -> Option<Self> {
        if quantity > Decimal::ZERO {
            Some(OrderSide::Sell)
        } else if quantity < Decimal::ZERO {
            Some(OrderSide::Buy)
        } else {
            None
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// SecurityType
// =============================================================================

/// Instrument class of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SecurityType {
    /// Common stock
    #[default]
    #[serde(rename = "STK")]
    Stock,
    /// Option contract
    #[serde(rename = "OPT")]
    Option,
    /// Futures contract
    #[serde(rename = "FUT")]
    Future,
    /// Spot currency pair
    #[serde(rename = "CASH")]
    Forex,
}

impl SecurityType {
    /// Lower-case label used by webhook receivers ("stock", "option", ...)
    pub fn label(&self) -> &'static str {
        match self {
            SecurityType::Stock => "stock",
            SecurityType::Option => "option",
            SecurityType::Future => "future",
            SecurityType::Forex => "forex",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
