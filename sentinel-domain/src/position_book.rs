//! Position Book
//!
//! Most-recent snapshot of the account's positions, keyed by contract id.
//!
//! # Invariants
//! - One entry per contract id; a later update overwrites the earlier one
//! - Iteration follows the order in which contract ids were first seen

use std::collections::HashMap;

use crate::entities::Position;
use crate::value_objects::ContractId;

/// Insertion-ordered, last-write-wins position snapshot
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    order: Vec<ContractId>,
    positions: HashMap<ContractId, Position>,
}

impl PositionBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a position update, returning the entry it replaced
    pub fn upsert(&mut self, position: Position) -> Option<Position> {
        let id = position.contract_id();
        let previous = self.positions.insert(id, position);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Latest position for a contract
    pub fn get(&self, id: ContractId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// All positions in first-seen order (flat ones included)
    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.order.iter().filter_map(|id| self.positions.get(id))
    }

    /// Positions with a nonzero quantity, in first-seen order
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.iter().filter(|p| !p.is_flat())
    }

    /// True when at least one position is nonzero
    pub fn has_open_positions(&self) -> bool {
        self.positions.values().any(|p| !p.is_flat())
    }

    /// Number of contracts seen
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True before any update arrived
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Contract;
    use crate::value_objects::Symbol;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn position(id: i64, symbol: &str, quantity: Decimal) -> Position {
        Position::new(
            "DU000001",
            Contract::stock(ContractId(id), Symbol::new(symbol).unwrap()),
            quantity,
            dec!(100),
        )
    }

    #[test]
    fn test_iterates_in_first_seen_order() {
        let mut book = PositionBook::new();
        book.upsert(position(3, "TSLA", dec!(5)));
        book.upsert(position(1, "AAPL", dec!(100)));
        book.upsert(position(2, "MSFT", dec!(-50)));

        let symbols: Vec<&str> = book.iter().map(|p| p.symbol().as_str()).collect();
        assert_eq!(symbols, vec!["TSLA", "AAPL", "MSFT"]);
    }

    #[test]
    fn test_last_write_wins_keeps_original_slot() {
        let mut book = PositionBook::new();
        book.upsert(position(1, "AAPL", dec!(100)));
        book.upsert(position(2, "MSFT", dec!(-50)));

        let previous = book.upsert(position(1, "AAPL", dec!(40)));

        assert_eq!(previous.unwrap().quantity, dec!(100));
        assert_eq!(book.len(), 2);
        assert_eq!(book.get(ContractId(1)).unwrap().quantity, dec!(40));
        assert_eq!(book.iter().next().unwrap().symbol().as_str(), "AAPL");
    }

    #[test]
    fn test_open_positions_skip_flat() {
        let mut book = PositionBook::new();
        book.upsert(position(1, "AAPL", dec!(100)));
        book.upsert(position(2, "TSLA", Decimal::ZERO));

        assert!(book.has_open_positions());
        assert_eq!(book.open_positions().count(), 1);

        book.upsert(position(1, "AAPL", Decimal::ZERO));
        assert!(!book.has_open_positions());
        assert_eq!(book.len(), 2);
    }

    #[test]
    fn test_empty_book() {
        let book = PositionBook::new();
        assert!(book.is_empty());
        assert!(!book.has_open_positions());
        assert!(book.get(ContractId(42)).is_none());
    }
}
