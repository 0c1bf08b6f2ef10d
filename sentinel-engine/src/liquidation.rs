//! Liquidation plan: the closing orders for a position book.

use sentinel_domain::{MarketOrder, PositionBook, Symbol};

/// Orders that flatten every open position, in book order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiquidationPlan {
    /// One market order per nonzero position
    pub orders: Vec<MarketOrder>,
    /// Tickers of flat positions that need no order
    pub skipped: Vec<Symbol>,
}

impl LiquidationPlan {
    /// Build the plan from the current snapshot
    ///
    /// Long positions get a SELL and short positions a BUY, each sized at the
    /// absolute quantity. Flat positions are skipped.
    pub fn from_book(book: &PositionBook) -> Self {
        let mut plan = Self::default();
        for position in book.iter() {
            match MarketOrder::closing(position) {
                Some(order) => plan.orders.push(order),
                None => plan.skipped.push(position.symbol().clone()),
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
