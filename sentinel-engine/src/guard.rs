//! Loss Guard: the liquidation monitor's state machine.
//!
//! Pure and synchronous. The async monitor feeds it gateway events and acts
//! on the returned [`GuardAction`].
//!
//! ```text
//! Connecting → AwaitingReadiness → Monitoring → Liquidating → Finished
//! ```
//!
//! - PnL readings received before readiness are buffered (latest wins) and
//!   evaluated the moment both readiness gates open.
//! - The action flag flips false → true at most once; after that no reading
//!   can trigger another liquidation.

use std::fmt;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use sentinel_domain::{GatewayEvent, PnlReading, PositionBook};

use crate::liquidation::LiquidationPlan;
use crate::readiness::ReadinessGates;
use crate::threshold::{ThresholdCheck, ThresholdConfig, ThresholdPolicy};

// =============================================================================
// State
// =============================================================================

/// Lifecycle of a monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Session not yet established
    Connecting,
    /// Waiting for both readiness gates
    AwaitingReadiness,
    /// Evaluating every PnL update
    Monitoring,
    /// Closing orders are being sent
    Liquidating,
    /// Terminal: liquidation done, no further evaluation
    Finished,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Connecting => write!(f, "connecting"),
            MonitorState::AwaitingReadiness => write!(f, "awaiting_readiness"),
            MonitorState::Monitoring => write!(f, "monitoring"),
            MonitorState::Liquidating => write!(f, "liquidating"),
            MonitorState::Finished => write!(f, "finished"),
        }
    }
}

/// What the driver should do after an event
#[derive(Debug, Clone, PartialEq)]
pub enum GuardAction {
    /// Nothing to do
    Idle,
    /// Both readiness gates just opened
    Ready,
    /// A reading was evaluated without breaching
    Evaluated(ThresholdCheck),
    /// Threshold breached: execute the plan, then finish
    Liquidate {
        check: ThresholdCheck,
        plan: LiquidationPlan,
    },
}

// =============================================================================
// Loss Guard
// =============================================================================

/// Threshold policy, position book and readiness gates behind one state machine
#[derive(Debug)]
pub struct LossGuard {
    state: MonitorState,
    policy: ThresholdPolicy,
    book: PositionBook,
    gates: ReadinessGates,
    /// Latest reading received before readiness
    pending: Option<PnlReading>,
    latest_equity: Option<Decimal>,
    action_taken: bool,
}

impl LossGuard {
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            state: MonitorState::Connecting,
            policy: ThresholdPolicy::new(config),
            book: PositionBook::new(),
            gates: ReadinessGates::new(),
            pending: None,
            latest_equity: None,
            action_taken: false,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    pub fn policy(&self) -> &ThresholdPolicy {
        &self.policy
    }

    pub fn action_taken(&self) -> bool {
        self.action_taken
    }

    pub fn is_ready(&self) -> bool {
        self.gates.is_ready()
    }

    /// Gates still closed
    pub fn pending_gates(&self) -> Vec<&'static str> {
        self.gates.pending()
    }

    /// Reading buffered while awaiting readiness
    pub fn pending_reading(&self) -> Option<&PnlReading> {
        self.pending.as_ref()
    }

    /// Latest `NetLiquidation` value seen
    pub fn latest_equity(&self) -> Option<Decimal> {
        self.latest_equity
    }

    /// Session established
    pub fn on_connected(&mut self) {
        if self.state == MonitorState::Connecting {
            self.state = MonitorState::AwaitingReadiness;
        }
    }

    /// Liquidation sequence completed
    pub fn finish(&mut self) {
        if self.state == MonitorState::Liquidating {
            self.state = MonitorState::Finished;
        }
    }

    /// Feed one gateway event
    pub fn apply(&mut self, event: &GatewayEvent) -> GuardAction {
        match event {
            GatewayEvent::PositionUpdate(position) => {
                let opens_gate = !position.is_flat();
                self.book.upsert(position.clone());
                if opens_gate && self.gates.book_populated() {
                    debug!(symbol = %position.symbol(), "Readiness gate opened: book_populated");
                }
                self.check_readiness()
            }

            GatewayEvent::PositionsComplete => {
                if self.gates.positions_complete() {
                    debug!(positions = self.book.len(), "Readiness gate opened: positions_complete");
                }
                self.check_readiness()
            }

            GatewayEvent::AccountSummary(value) => {
                if let Some(equity) = value.net_liquidation() {
                    self.latest_equity = Some(equity);
                    self.policy.observe_equity(equity);
                }
                if self.gates.book_populated() {
                    debug!(tag = %value.tag, "Readiness gate opened: book_populated");
                }
                self.check_readiness()
            }

            GatewayEvent::PnlUpdate(reading) => self.on_pnl(reading.clone()),

            GatewayEvent::OrderStatus(_) | GatewayEvent::GatewayError { .. } => GuardAction::Idle,
        }
    }

    fn on_pnl(&mut self, reading: PnlReading) -> GuardAction {
        match self.state {
            MonitorState::Connecting | MonitorState::AwaitingReadiness => {
                debug!(
                    daily_pnl = %reading.daily_pnl,
                    pending_gates = ?self.gates.pending(),
                    "PnL update buffered until readiness"
                );
                self.pending = Some(reading);
                GuardAction::Idle
            }
            MonitorState::Monitoring => self.evaluate(reading),
            MonitorState::Liquidating | MonitorState::Finished => GuardAction::Idle,
        }
    }

    fn check_readiness(&mut self) -> GuardAction {
        if self.state != MonitorState::AwaitingReadiness || !self.gates.is_ready() {
            return GuardAction::Idle;
        }

        self.state = MonitorState::Monitoring;
        info!(
            positions = self.book.len(),
            open_positions = self.book.open_positions().count(),
            "Readiness reached, monitoring PnL"
        );

        match self.pending.take() {
            Some(reading) => match self.evaluate(reading) {
                action @ GuardAction::Liquidate { .. } => action,
                _ => GuardAction::Ready,
            },
            None => GuardAction::Ready,
        }
    }

    fn evaluate(&mut self, mut reading: PnlReading) -> GuardAction {
        if reading.equity.is_none() {
            reading.equity = self.latest_equity;
        }

        let Some(check) = self.policy.evaluate(&reading) else {
            warn!(
                mode = %self.policy.config().mode(),
                daily_pnl = %reading.daily_pnl,
                "PnL reading not evaluable (no usable equity)"
            );
            return GuardAction::Idle;
        };

        if !check.breached {
            return GuardAction::Evaluated(check);
        }

        if self.action_taken {
            return GuardAction::Idle;
        }

        self.action_taken = true;
        self.state = MonitorState::Liquidating;

        let plan = LiquidationPlan::from_book(&self.book);
        warn!(
            mode = %check.mode,
            observed = %check.observed,
            limit = %check.limit,
            orders = plan.len(),
            "Loss threshold breached, liquidating"
        );

        GuardAction::Liquidate { check, plan }
    }
}

// =============================================================================
// Tests
// =============================================================================
