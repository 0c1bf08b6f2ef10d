//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Broker gateway (stub or replay, per configuration)
//! - Close notifier (webhook, when configured)
//! - Liquidation Monitor
//!
//! # Lifecycle
//!
//! 1. Build the gateway and notifier from configuration
//! 2. Watch for Ctrl-C and cancel the shutdown token
//! 3. Run the monitor to completion
//! 4. Log the outcome

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sentinel_connectors::{ReplayGateway, WebhookNotifier};
use sentinel_exec::{BrokerGateway, NotifierPort, StubGateway};

use crate::config::{Config, GatewayKind};
use crate::error::{DaemonError, DaemonResult};
use crate::monitor::{LiquidationMonitor, MonitorOutcome};

// =============================================================================
// Daemon
// =============================================================================

/// The main Sentinel daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Cancelled on Ctrl-C
    shutdown: CancellationToken,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the daemon when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the daemon.
    ///
    /// Returns once the monitor liquidated, was stopped, or failed.
    pub async fn run(self) -> DaemonResult<MonitorOutcome> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            gateway = %self.config.gateway.kind,
            threshold = %self.config.threshold,
            webhook = self.config.webhook.is_some(),
            "Starting sentinel daemon"
        );

        self.spawn_signal_watcher();

        let result = match self.config.gateway.kind {
            GatewayKind::Stub => {
                let account = self.config.monitor.account.clone().unwrap_or_else(|| "DU000001".to_string());
                self.run_with(Arc::new(StubGateway::new(account))).await
            }
            GatewayKind::Replay => {
                let path = self.config.gateway.replay_file.clone().ok_or_else(|| {
                    DaemonError::Config("SENTINEL_REPLAY_FILE is required for the replay gateway".to_string())
                })?;
                let gateway = ReplayGateway::new(path)
                    .with_interval(Duration::from_millis(self.config.gateway.replay_interval_ms));
                self.run_with(Arc::new(gateway)).await
            }
        };

        match &result {
            Ok(MonitorOutcome::Liquidated(report)) => info!(
                id = %report.id,
                submitted = report.submitted.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                global_cancel_sent = report.global_cancel_sent,
                "Liquidation complete, daemon exiting"
            ),
            Ok(MonitorOutcome::Stopped) => info!("Monitor stopped, daemon exiting"),
            Err(e) => error!(error = %e, "Daemon failed"),
        }

        result
    }

    /// Run the monitor against `gateway`.
    pub async fn run_with<G: BrokerGateway>(&self, gateway: Arc<G>) -> DaemonResult<MonitorOutcome> {
        let mut monitor = LiquidationMonitor::new(
            gateway,
            self.config.gateway.endpoint.clone(),
            self.config.monitor.clone(),
            self.config.threshold,
            self.shutdown.clone(),
        );

        if let Some(notifier) = self.build_notifier() {
            monitor = monitor.with_notifier(notifier);
        }

        monitor.run().await
    }

    fn build_notifier(&self) -> Option<Arc<dyn NotifierPort>> {
        self.config.webhook.as_ref().map(|webhook| {
            info!(url = %webhook.url, "Close notifications enabled");
            Arc::new(WebhookNotifier::new(
                webhook.url.clone(),
                webhook.key.clone(),
                self.config.gateway.endpoint.client_id,
            )) as Arc<dyn NotifierPort>
        })
    }

    fn spawn_signal_watcher(&self) {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if result.is_ok() {
                        info!("Received shutdown signal");
                        token.cancel();
                    }
                }
                _ = token.cancelled() => {}
            }
        });
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_domain::{Contract, ContractId, GatewayEvent, PnlReading, Position, Symbol};
    use std::io::Write;

    #[tokio::test]
    async fn test_stub_daemon_stops_on_shutdown() {
        let daemon = Daemon::new(Config::test());
        let token = daemon.shutdown_token();

        let handle = tokio::spawn(daemon.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert!(matches!(outcome, MonitorOutcome::Stopped));
    }

    #[tokio::test]
    async fn test_run_with_liquidates_on_breach() {
        let daemon = Daemon::new(Config::test());
        let gateway = Arc::new(
            StubGateway::new("DU000001")
                .with_position(Position::new(
                    "DU000001",
                    Contract::stock(ContractId(1), Symbol::new("AAPL").unwrap()),
                    dec!(100),
                    dec!(187.5),
                ))
                .with_event(GatewayEvent::PnlUpdate(PnlReading::daily(dec!(-300.01)))),
        );

        let outcome = daemon.run_with(gateway.clone()).await.unwrap();

        assert!(matches!(outcome, MonitorOutcome::Liquidated(_)));
        assert_eq!(gateway.submitted_orders().len(), 1);
    }

    #[tokio::test]
    async fn test_replay_daemon_liquidates_from_recording() {
        let mut feed = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            feed,
            r#"{{"type":"position_update","account":"DU1","contract":{{"id":265598,"symbol":"AAPL"}},"quantity":"100","avg_cost":"187.5"}}"#
        )
        .unwrap();
        writeln!(feed, r#"{{"type":"positions_complete"}}"#).unwrap();
        writeln!(
            feed,
            r#"{{"type":"pnl_update","daily_pnl":"-301","unrealized_pnl":"-301","realized_pnl":"0"}}"#
        )
        .unwrap();

        let mut config = Config::test();
        config.gateway.kind = GatewayKind::Replay;
        config.gateway.replay_file = Some(feed.path().to_path_buf());
        config.monitor.account = None;

        match Daemon::new(config).run().await.unwrap() {
            MonitorOutcome::Liquidated(report) => {
                assert_eq!(report.submitted.len(), 1);
                assert_eq!(report.submitted[0].symbol.as_str(), "AAPL");
            }
            other => panic!("Expected Liquidated, got {:?}", other),
        }
    }
}
