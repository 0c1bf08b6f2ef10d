//! Liquidator: turns a liquidation plan into gateway calls.
//!
//! # Flow
//!
//! ```text
//! LiquidationPlan → place_market_order (all) → notify_close (all) → global_cancel
//! ```
//!
//! A failing order never stops the sequence. All orders are placed before any
//! notification is sent, so a slow webhook cannot hold back a closing order.
//! Every planned position gets its notification, then one global cancel is sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use sentinel_domain::{OrderAck, PositionBook, Symbol};
use sentinel_engine::LiquidationPlan;

use crate::ports::{BrokerGateway, CloseNotice, NotifierPort};

// =============================================================================
// Report
// =============================================================================

/// An order that could not be placed
#[derive(Debug, Clone, Serialize)]
pub struct FailedOrder {
    pub symbol: Symbol,
    pub reason: String,
}

/// Outcome of one liquidation sequence
#[derive(Debug, Clone, Serialize)]
pub struct LiquidationReport {
    /// Time-ordered identifier of the sequence
    pub id: Uuid,
    pub submitted: Vec<OrderAck>,
    pub failed: Vec<FailedOrder>,
    /// Flat positions that needed no order
    pub skipped: Vec<Symbol>,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub global_cancel_sent: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LiquidationReport {
    /// True when every planned order was accepted and the cancel went out
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.global_cancel_sent
    }
}

// =============================================================================
// Liquidator
// =============================================================================

/// Executes a [`LiquidationPlan`] against a broker gateway.
pub struct Liquidator<G: BrokerGateway> {
    gateway: Arc<G>,
    notifier: Option<Arc<dyn NotifierPort>>,
}

impl<G: BrokerGateway> Liquidator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway, notifier: None }
    }

    /// Send a close notice per planned position
    pub fn with_notifier(mut self, notifier: Arc<dyn NotifierPort>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run the sequence.
    ///
    /// Order and notification failures are logged and recorded in the
    /// report; this never returns early. `book` supplies the position
    /// details (average cost) carried by the notices.
    pub async fn execute(&self, plan: &LiquidationPlan, book: &PositionBook) -> LiquidationReport {
        let id = Uuid::now_v7();
        let started_at = Utc::now();

        info!(%id, orders = plan.len(), skipped = plan.skipped.len(), "Liquidation started");

        let mut submitted = Vec::with_capacity(plan.len());
        let mut failed = Vec::new();
        let mut notifications_sent = 0;
        let mut notifications_failed = 0;

        for order in &plan.orders {
            info!(
                symbol = %order.symbol(),
                side = %order.side,
                quantity = %order.quantity.as_decimal(),
                "Closing position"
            );

            match self.gateway.place_market_order(order).await {
                Ok(ack) => {
                    info!(order_id = ack.order_id, symbol = %ack.symbol, "Close order submitted");
                    submitted.push(ack);
                }
                Err(e) => {
                    error!(symbol = %order.symbol(), error = %e, "Close order failed");
                    failed.push(FailedOrder {
                        symbol: order.symbol().clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        // All orders go out before the first notification
        if let Some(notifier) = &self.notifier {
            for position in plan.orders.iter().filter_map(|order| book.get(order.contract.id)) {
                match notifier.notify_close(&CloseNotice::for_position(position)).await {
                    Ok(()) => notifications_sent += 1,
                    Err(e) => {
                        warn!(symbol = %position.symbol(), error = %e, "Close notification failed");
                        notifications_failed += 1;
                    }
                }
            }
        }

        let global_cancel_sent = match self.gateway.global_cancel().await {
            Ok(()) => {
                info!("Global cancel sent");
                true
            }
            Err(e) => {
                error!(error = %e, "Global cancel failed");
                false
            }
        };

        let report = LiquidationReport {
            id,
            submitted,
            failed,
            skipped: plan.skipped.clone(),
            notifications_sent,
            notifications_failed,
            global_cancel_sent,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            %id,
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            notifications_failed,
            "Liquidation finished"
        );

        report
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{StubGateway, StubNotifier};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sentinel_domain::{Contract, ContractId, OrderSide, Position};

    fn position(id: i64, symbol: &str, quantity: Decimal) -> Position {
        Position::new(
            "DU000001",
            Contract::stock(ContractId(id), Symbol::new(symbol).unwrap()),
            quantity,
            dec!(150.5),
        )
    }

    fn sample_book() -> PositionBook {
        let mut book = PositionBook::new();
        book.upsert(position(1, "AAPL", dec!(100)));
        book.upsert(position(2, "MSFT", dec!(-50)));
        book.upsert(position(3, "TSLA", Decimal::ZERO));
        book
    }

    #[tokio::test]
    async fn test_liquidates_all_open_positions() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        let liquidator = Liquidator::new(gateway.clone());
        let book = sample_book();

        let report = liquidator.execute(&LiquidationPlan::from_book(&book), &book).await;

        let orders = gateway.submitted_orders();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].symbol().as_str(), "AAPL");
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[1].symbol().as_str(), "MSFT");
        assert_eq!(orders[1].side, OrderSide::Buy);
        assert_eq!(orders[1].quantity.as_decimal(), dec!(50));

        assert_eq!(report.skipped, vec![Symbol::new("TSLA").unwrap()]);
        assert!(report.is_clean());
        assert_eq!(gateway.global_cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_order_failure_does_not_stop_sequence() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        gateway.reject_orders_for("AAPL");
        let notifier = Arc::new(StubNotifier::new());
        let liquidator = Liquidator::new(gateway.clone()).with_notifier(notifier.clone());
        let book = sample_book();

        let report = liquidator.execute(&LiquidationPlan::from_book(&book), &book).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].symbol.as_str(), "AAPL");
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.submitted[0].symbol.as_str(), "MSFT");
        assert!(!report.is_clean());

        // Notices go out regardless of order outcome
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(gateway.global_cancel_count(), 1);
    }

    #[tokio::test]
    async fn test_notification_failures_are_counted() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        let notifier = Arc::new(StubNotifier::new());
        notifier.set_fail(true);
        let liquidator = Liquidator::new(gateway.clone()).with_notifier(notifier);
        let book = sample_book();

        let report = liquidator.execute(&LiquidationPlan::from_book(&book), &book).await;

        assert_eq!(report.notifications_failed, 2);
        assert_eq!(report.notifications_sent, 0);
        assert_eq!(report.submitted.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_plan_still_cancels() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        let liquidator = Liquidator::new(gateway.clone());

        let report = liquidator.execute(&LiquidationPlan::default(), &PositionBook::new()).await;

        assert!(report.submitted.is_empty());
        assert!(report.global_cancel_sent);
        assert_eq!(gateway.global_cancel_count(), 1);
    }

    struct SlowNotifier {
        gateway: Arc<StubGateway>,
        delay: std::time::Duration,
        /// (symbol, orders submitted when the notice went out)
        seen: std::sync::Mutex<Vec<(String, usize)>>,
    }

    #[async_trait::async_trait]
    impl NotifierPort for SlowNotifier {
        async fn notify_close(&self, notice: &CloseNotice) -> Result<(), crate::error::ExecError> {
            let submitted = self.gateway.submitted_orders().len();
            self.seen.lock().unwrap().push((notice.symbol.to_string(), submitted));
            tokio::time::sleep(self.delay).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_notifier_does_not_delay_orders() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        let notifier = Arc::new(SlowNotifier {
            gateway: gateway.clone(),
            delay: std::time::Duration::from_millis(50),
            seen: std::sync::Mutex::new(Vec::new()),
        });
        let liquidator = Liquidator::new(gateway.clone()).with_notifier(notifier.clone());

        let mut book = PositionBook::new();
        book.upsert(position(1, "AAPL", dec!(100)));
        book.upsert(position(2, "MSFT", dec!(-50)));
        book.upsert(position(3, "NVDA", dec!(10)));

        let report = liquidator.execute(&LiquidationPlan::from_book(&book), &book).await;

        let seen = notifier.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                ("AAPL".to_string(), 3),
                ("MSFT".to_string(), 3),
                ("NVDA".to_string(), 3),
            ]
        );
        assert_eq!(report.notifications_sent, 3);
        assert_eq!(gateway.global_cancel_count(), 1);
    }
}
