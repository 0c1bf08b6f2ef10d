//! Sentinel Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains value objects, broker entities, the position book and
//! the typed gateway events.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod events;
pub mod position_book;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{
    AccountId, AccountValue, Contract, MarketOrder, OrderAck, OrderId, OrderStatusUpdate,
    PnlReading, Position, CLOSE_ALL_ORDER_REF,
};
pub use events::GatewayEvent;
pub use position_book::PositionBook;
pub use value_objects::{ContractId, DomainError, OrderSide, Quantity, SecurityType, Symbol};
