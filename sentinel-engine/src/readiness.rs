//! Readiness gates.
//!
//! PnL is only evaluated once both gates are open:
//! - **book populated**: a nonzero position or an account-summary value arrived
//! - **positions complete**: the gateway signalled the end of the position list
//!
//! Each gate is one-shot: once open it never closes again.

/// A one-shot signal
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    name: &'static str,
    open: bool,
}

impl ReadinessGate {
    /// Create a closed gate
    pub fn new(name: &'static str) -> Self {
        Self { name, open: false }
    }

    /// Open the gate. Returns true only on the first call.
    pub fn open(&mut self) -> bool {
        let first = !self.open;
        self.open = true;
        first
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// The two gates guarding evaluation
#[derive(Debug, Clone)]
pub struct ReadinessGates {
    book_populated: ReadinessGate,
    positions_complete: ReadinessGate,
}

impl ReadinessGates {
    pub fn new() -> Self {
        Self {
            book_populated: ReadinessGate::new("book_populated"),
            positions_complete: ReadinessGate::new("positions_complete"),
        }
    }

    /// A nonzero position or an account-summary value was received
    pub fn book_populated(&mut self) -> bool {
        self.book_populated.open()
    }

    /// The position list was fully received
    pub fn positions_complete(&mut self) -> bool {
        self.positions_complete.open()
    }

    /// Both gates open
    pub fn is_ready(&self) -> bool {
        self.book_populated.is_open() && self.positions_complete.is_open()
    }

    /// Names of the gates still closed
    pub fn pending(&self) -> Vec<&'static str> {
        [&self.book_populated, &self.positions_complete]
            .into_iter()
            .filter(|g| !g.is_open())
            .map(ReadinessGate::name)
            .collect()
    }
}

impl Default for ReadinessGates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_is_one_shot() {
        let mut gate = ReadinessGate::new("g");
        assert!(!gate.is_open());
        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[test]
    fn test_both_gates_required() {
        let mut gates = ReadinessGates::new();
        assert_eq!(gates.pending(), vec!["book_populated", "positions_complete"]);

        gates.positions_complete();
        assert!(!gates.is_ready());
        assert_eq!(gates.pending(), vec!["book_populated"]);

        gates.book_populated();
        assert!(gates.is_ready());
        assert!(gates.pending().is_empty());
    }
}
