//! Liquidation Monitor: drives the loss guard from the gateway event feed.
//!
//! # Lifecycle
//!
//! 1. Connect (optionally retried with exponential backoff)
//! 2. Resolve the account and subscribe: open orders, positions, account
//!    summary, PnL
//! 3. Receive-and-dispatch loop feeding every event to the [`LossGuard`]
//! 4. On a breach, execute the liquidation plan once
//! 5. Disconnect, whatever ended the run
//!
//! The loop owns the guard (and with it the position book); nothing else
//! mutates it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sentinel_domain::{AccountId, GatewayEvent};
use sentinel_engine::{GuardAction, LossGuard, ThresholdConfig};
use sentinel_exec::{
    BrokerGateway, EventStream, GatewayEndpoint, LiquidationReport, Liquidator, NotifierPort,
};

use crate::config::MonitorConfig;
use crate::error::{DaemonError, DaemonResult};

/// How a monitoring run ended without error
#[derive(Debug)]
pub enum MonitorOutcome {
    /// Threshold breached and the liquidation sequence ran
    Liquidated(LiquidationReport),
    /// Shutdown requested before any breach
    Stopped,
}

/// Gateway notices in this range are informational (e.g., "data farm
/// connection is OK") rather than failures.
fn is_informational(code: i32) -> bool {
    (2100..2200).contains(&code)
}

// =============================================================================
// Liquidation Monitor
// =============================================================================

/// Async driver for one monitoring session.
pub struct LiquidationMonitor<G: BrokerGateway> {
    gateway: Arc<G>,
    endpoint: GatewayEndpoint,
    config: MonitorConfig,
    guard: LossGuard,
    liquidator: Liquidator<G>,
    shutdown: CancellationToken,
}

impl<G: BrokerGateway> LiquidationMonitor<G> {
    pub fn new(
        gateway: Arc<G>,
        endpoint: GatewayEndpoint,
        config: MonitorConfig,
        threshold: ThresholdConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            liquidator: Liquidator::new(gateway.clone()),
            gateway,
            endpoint,
            config,
            guard: LossGuard::new(threshold),
            shutdown,
        }
    }

    /// Send close notices through `notifier` during liquidation
    pub fn with_notifier(mut self, notifier: Arc<dyn NotifierPort>) -> Self {
        self.liquidator = self.liquidator.with_notifier(notifier);
        self
    }

    /// Guard state (for inspection after a run)
    pub fn guard(&self) -> &LossGuard {
        &self.guard
    }

    /// Run until liquidation, shutdown or a fatal error.
    ///
    /// # Errors
    ///
    /// - `ConnectionFailed` when no connect attempt succeeded
    /// - `NoAccount` when no account can be resolved
    /// - `ReadinessTimeout` when the readiness gates stay closed too long
    /// - `FeedClosed` when the gateway feed ends first
    pub async fn run(&mut self) -> DaemonResult<MonitorOutcome> {
        let Some(mut events) = self.connect().await? else {
            return Ok(MonitorOutcome::Stopped);
        };
        self.guard.on_connected();

        let result = match self.subscribe().await {
            Ok(()) => self.dispatch(&mut events).await,
            Err(e) => Err(e),
        };

        match self.gateway.disconnect().await {
            Ok(()) => info!("Disconnected from gateway"),
            Err(e) => warn!(error = %e, "Disconnect failed"),
        }

        result
    }

    /// `None` when shutdown was requested while waiting to retry
    async fn connect(&self) -> DaemonResult<Option<EventStream>> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.gateway.connect(&self.endpoint).await {
                Ok(events) => {
                    info!(endpoint = %self.endpoint, attempt, "Connected to gateway");
                    return Ok(Some(events));
                }
                Err(e) if attempt < attempts => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connect failed, retrying"
                    );

                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            info!(attempt, "Shutdown requested while reconnecting");
                            return Ok(None);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    error!(endpoint = %self.endpoint, attempts = attempt, error = %e, "Connect failed");
                    return Err(DaemonError::ConnectionFailed { attempts: attempt, source: e });
                }
            }
        }
    }

    async fn resolve_account(&self) -> DaemonResult<AccountId> {
        if let Some(account) = &self.config.account {
            return Ok(account.clone());
        }

        let accounts = self.gateway.managed_accounts().await?;
        match accounts.into_iter().next() {
            Some(account) => {
                info!(%account, "Using first managed account");
                Ok(account)
            }
            None => Err(DaemonError::NoAccount("Gateway reports no managed accounts".to_string())),
        }
    }

    /// Subscription failures are logged; the run continues degraded.
    async fn subscribe(&self) -> DaemonResult<()> {
        let account = self.resolve_account().await?;

        if let Err(e) = self.gateway.request_open_orders().await {
            warn!(error = %e, "Open orders request failed");
        }
        if let Err(e) = self.gateway.request_positions().await {
            warn!(error = %e, "Position subscription failed");
        }
        if let Err(e) = self.gateway.request_account_summary().await {
            warn!(error = %e, "Account summary subscription failed");
        }
        if let Err(e) = self.gateway.request_pnl(&account).await {
            warn!(%account, error = %e, "PnL subscription failed");
        }

        info!(%account, "Subscriptions requested, awaiting readiness");
        Ok(())
    }

    async fn dispatch(&mut self, events: &mut EventStream) -> DaemonResult<MonitorOutcome> {
        let shutdown = self.shutdown.clone();
        let timeout = self.config.readiness_timeout();
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let awaiting = !self.guard.is_ready();
            let readiness_expired = async move {
                match deadline {
                    Some(at) if awaiting => tokio::time::sleep_until(at).await,
                    _ => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!(state = %self.guard.state(), "Shutdown requested, monitor stopping");
                    return Ok(MonitorOutcome::Stopped);
                }

                _ = readiness_expired => {
                    let pending = self.guard.pending_gates().join(", ");
                    error!(%pending, "Readiness timeout");
                    return Err(DaemonError::ReadinessTimeout {
                        secs: timeout.map_or(0, |t: Duration| t.as_secs()),
                        pending,
                    });
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        warn!(state = %self.guard.state(), "Gateway event feed closed");
                        return Err(DaemonError::FeedClosed);
                    };

                    if let Some(report) = self.handle(event).await {
                        return Ok(MonitorOutcome::Liquidated(report));
                    }
                }
            }
        }
    }

    async fn handle(&mut self, event: GatewayEvent) -> Option<LiquidationReport> {
        match &event {
            GatewayEvent::PnlUpdate(reading) => info!(
                daily_pnl = %reading.daily_pnl,
                unrealized_pnl = %reading.unrealized_pnl,
                realized_pnl = %reading.realized_pnl,
                "PnL update"
            ),
            GatewayEvent::PositionUpdate(position) => info!(
                account = %position.account,
                symbol = %position.symbol(),
                quantity = %position.quantity,
                avg_cost = %position.avg_cost,
                "Position"
            ),
            GatewayEvent::OrderStatus(status) => info!(
                order_id = status.order_id,
                status = %status.status,
                filled = %status.filled,
                remaining = %status.remaining,
                avg_fill_price = %status.avg_fill_price,
                "Order status"
            ),
            GatewayEvent::GatewayError { code, message } if is_informational(*code) => {
                info!(code, %message, "Gateway notice")
            }
            GatewayEvent::GatewayError { code, message } => {
                warn!(code, %message, "Gateway error")
            }
            other => debug!(kind = other.kind(), "Gateway event"),
        }

        match self.guard.apply(&event) {
            GuardAction::Idle | GuardAction::Ready => None,
            GuardAction::Evaluated(check) => {
                debug!(observed = %check.observed, limit = %check.limit, "PnL within limit");
                None
            }
            GuardAction::Liquidate { plan, .. } => {
                let report = self.liquidator.execute(&plan, self.guard.book()).await;
                self.guard.finish();
                Some(report)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_domain::{Contract, ContractId, PnlReading, Position, Symbol};
    use sentinel_engine::MonitorState;
    use sentinel_exec::StubGateway;

    fn monitor_config() -> MonitorConfig {
        MonitorConfig {
            account: Some("DU000001".to_string()),
            readiness_timeout_secs: 0,
            connect_attempts: 1,
            connect_backoff_ms: 1,
        }
    }

    fn build_monitor(gateway: Arc<StubGateway>, config: MonitorConfig) -> LiquidationMonitor<StubGateway> {
        LiquidationMonitor::new(
            gateway,
            GatewayEndpoint::default(),
            config,
            ThresholdConfig::default(),
            CancellationToken::new(),
        )
    }

    fn aapl() -> Position {
        Position::new(
            "DU000001",
            Contract::stock(ContractId(265598), Symbol::new("AAPL").unwrap()),
            dec!(100),
            dec!(187.5),
        )
    }

    #[test]
    fn test_informational_codes() {
        assert!(is_informational(2104));
        assert!(is_informational(2158));
        assert!(!is_informational(201));
        assert!(!is_informational(502));
    }

    #[tokio::test]
    async fn test_connect_retries_then_succeeds() {
        let gateway = Arc::new(
            StubGateway::new("DU000001")
                .with_position(aapl())
                .with_event(GatewayEvent::PnlUpdate(PnlReading::daily(dec!(-300)))),
        );
        gateway.fail_connects(2);

        let mut monitor = build_monitor(gateway.clone(), MonitorConfig { connect_attempts: 3, ..monitor_config() });
        let outcome = monitor.run().await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Liquidated(_)));
        assert_eq!(gateway.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_fatal_without_retry() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        gateway.fail_connects(1);

        let mut monitor = build_monitor(gateway.clone(), monitor_config());
        let err = monitor.run().await.unwrap_err();

        assert!(matches!(err, DaemonError::ConnectionFailed { attempts: 1, .. }));
        assert_eq!(gateway.disconnect_count(), 0);
        assert_eq!(monitor.guard().state(), MonitorState::Connecting);
    }

    #[tokio::test]
    async fn test_shutdown_during_backoff_stops() {
        let gateway = Arc::new(StubGateway::new("DU000001"));
        gateway.fail_connects(5);
        let token = CancellationToken::new();

        let mut monitor = LiquidationMonitor::new(
            gateway.clone(),
            GatewayEndpoint::default(),
            MonitorConfig { connect_attempts: 5, connect_backoff_ms: 10_000, ..monitor_config() },
            ThresholdConfig::default(),
            token.clone(),
        );

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let outcome = monitor.run().await.unwrap();
        stopper.await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Stopped));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(gateway.connect_count(), 0);
        assert_eq!(gateway.disconnect_count(), 0);
        assert_eq!(monitor.guard().state(), MonitorState::Connecting);
    }

    #[tokio::test]
    async fn test_account_falls_back_to_managed_account() {
        let gateway = Arc::new(
            StubGateway::new("DU777")
                .with_position(aapl())
                .with_event(GatewayEvent::PnlUpdate(PnlReading::daily(dec!(-500)))),
        );

        let mut monitor = build_monitor(gateway.clone(), MonitorConfig { account: None, ..monitor_config() });
        let outcome = monitor.run().await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Liquidated(_)));
    }

    #[tokio::test]
    async fn test_subscription_failure_degrades_to_feed_closed() {
        let gateway = Arc::new(StubGateway::new("DU000001").with_position(aapl()));
        gateway.set_fail_subscriptions(true);

        let mut monitor = build_monitor(gateway.clone(), monitor_config());

        let feed = gateway.clone();
        let closer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            feed.close_feed();
        });

        let err = monitor.run().await.unwrap_err();
        closer.await.unwrap();

        assert!(matches!(err, DaemonError::FeedClosed));
        assert!(gateway.submitted_orders().is_empty());
        assert_eq!(gateway.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_readiness_timeout() {
        // No positions-complete marker ever arrives
        let gateway = Arc::new(StubGateway::new("DU000001"));
        gateway.set_fail_subscriptions(true);

        let mut monitor =
            build_monitor(gateway.clone(), MonitorConfig { readiness_timeout_secs: 1, ..monitor_config() });

        let err = monitor.run().await.unwrap_err();

        match err {
            DaemonError::ReadinessTimeout { secs, pending } => {
                assert_eq!(secs, 1);
                assert!(pending.contains("positions_complete"));
            }
            other => panic!("Expected ReadinessTimeout, got {:?}", other),
        }
        assert_eq!(gateway.disconnect_count(), 1);
    }
}
