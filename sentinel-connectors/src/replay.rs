//! Replay gateway: a recorded session played back from a JSON-lines file.
//!
//! Each non-empty line is one [`GatewayEvent`] in its serde form, e.g.
//!
//! ```text
//! {"type":"position_update","account":"DU1","contract":{"id":265598,"symbol":"AAPL"},"quantity":"100","avg_cost":"187.5"}
//! {"type":"positions_complete"}
//! {"type":"pnl_update","daily_pnl":"-310","unrealized_pnl":"-300","realized_pnl":"-10"}
//! ```
//!
//! Lines starting with `#` are comments. Malformed lines are logged and
//! skipped. Events are pushed from a dedicated OS thread with
//! `blocking_send`; the feed closes after the last line.
//!
//! Orders are acknowledged on paper and logged, never sent anywhere.

use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sentinel_domain::{AccountId, GatewayEvent, MarketOrder, OrderAck};
use sentinel_exec::{BrokerGateway, EventStream, ExecError, GatewayEndpoint, EVENT_CHANNEL_CAPACITY};

/// Parse one feed line; `Ok(None)` for blank and comment lines
pub fn parse_line(line: &str) -> Result<Option<GatewayEvent>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed).map(Some)
}

/// Gateway backed by a recorded event file.
pub struct ReplayGateway {
    path: PathBuf,
    /// Pause between events
    interval: Duration,
    stop: Arc<AtomicBool>,
    order_counter: AtomicI64,
    global_cancels: AtomicU32,
    paper_orders: Mutex<Vec<OrderAck>>,
}

impl ReplayGateway {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: Duration::ZERO,
            stop: Arc::new(AtomicBool::new(false)),
            order_counter: AtomicI64::new(0),
            global_cancels: AtomicU32::new(0),
            paper_orders: Mutex::new(Vec::new()),
        }
    }

    /// Pace the replay
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Orders acknowledged so far
    pub fn paper_orders(&self) -> Vec<OrderAck> {
        self.paper_orders.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn global_cancel_count(&self) -> u32 {
        self.global_cancels.load(Ordering::SeqCst)
    }

    fn open(&self) -> Result<File, ExecError> {
        File::open(&self.path).map_err(|e| {
            ExecError::Connection(format!("Cannot open replay feed {}: {}", self.path.display(), e))
        })
    }
}

fn pump(
    reader: BufReader<File>,
    tx: mpsc::Sender<GatewayEvent>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) {
    let mut sent = 0usize;

    for (index, line) in reader.lines().enumerate() {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Replay feed read failed, stopping");
                break;
            }
        };

        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping malformed replay line");
                continue;
            }
        };

        if tx.blocking_send(event).is_err() {
            debug!("Replay receiver dropped");
            break;
        }
        sent += 1;

        if !interval.is_zero() {
            thread::sleep(interval);
        }
    }

    info!(events = sent, "Replay feed finished");
}

#[async_trait]
impl BrokerGateway for ReplayGateway {
    async fn connect(&self, endpoint: &GatewayEndpoint) -> Result<EventStream, ExecError> {
        let reader = BufReader::new(self.open()?);
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        self.stop.store(false, Ordering::SeqCst);
        let stop = Arc::clone(&self.stop);
        let interval = self.interval;

        thread::Builder::new()
            .name("replay-feed".to_string())
            .spawn(move || pump(reader, tx, interval, stop))
            .map_err(|e| ExecError::Connection(format!("Cannot start replay thread: {}", e)))?;

        info!(path = %self.path.display(), %endpoint, "Replay session started");
        Ok(rx)
    }

    /// Accounts named by the recorded positions and account values
    async fn managed_accounts(&self) -> Result<Vec<AccountId>, ExecError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ExecError::Gateway(format!("Cannot read replay feed: {}", e)))?;

        let mut accounts: Vec<AccountId> = Vec::new();
        for event in content.lines().filter_map(|line| parse_line(line).ok().flatten()) {
            let account = match event {
                GatewayEvent::PositionUpdate(position) => position.account,
                GatewayEvent::AccountSummary(value) => value.account,
                _ => continue,
            };
            if !accounts.contains(&account) {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    async fn request_open_orders(&self) -> Result<(), ExecError> {
        debug!("Replay: open orders come from the recording");
        Ok(())
    }

    async fn request_positions(&self) -> Result<(), ExecError> {
        debug!("Replay: positions come from the recording");
        Ok(())
    }

    async fn request_account_summary(&self) -> Result<(), ExecError> {
        debug!("Replay: account summary comes from the recording");
        Ok(())
    }

    async fn request_pnl(&self, account: &str) -> Result<(), ExecError> {
        debug!(account, "Replay: pnl comes from the recording");
        Ok(())
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderAck, ExecError> {
        let order_id = self.order_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let ack = OrderAck::for_order(order_id, order);

        info!(
            order_id,
            symbol = %order.symbol(),
            side = %order.side,
            quantity = %order.quantity,
            "Replay: paper order acknowledged"
        );

        self.paper_orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ack.clone());
        Ok(ack)
    }

    async fn global_cancel(&self) -> Result<(), ExecError> {
        self.global_cancels.fetch_add(1, Ordering::SeqCst);
        info!("Replay: global cancel acknowledged");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        self.stop.store(true, Ordering::SeqCst);
        info!("Replay session closed");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
