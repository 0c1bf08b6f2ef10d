//! Stub implementations for testing.
//!
//! These implementations simulate a broker gateway session and a close
//! notifier without making real network calls.

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use sentinel_domain::{
    AccountId, AccountValue, GatewayEvent, MarketOrder, OrderAck, OrderId, Position,
};

use crate::error::ExecError;
use crate::ports::{
    BrokerGateway, CloseNotice, EventStream, GatewayEndpoint, NotifierPort, EVENT_CHANNEL_CAPACITY,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Stub Gateway
// =============================================================================

/// Stub broker gateway for testing.
///
/// Seeded positions and account values are emitted when requested, in the
/// order a real gateway would: positions then `PositionsComplete`. Scripted
/// events (e.g., PnL updates) are queued until `connect` and flushed
/// after the first data request, or pushed live with [`emit`](Self::emit).
pub struct StubGateway {
    accounts: Vec<AccountId>,
    positions: Mutex<Vec<Position>>,
    account_values: Mutex<Vec<AccountValue>>,
    /// Events delivered once subscriptions are in place
    scripted: Mutex<VecDeque<GatewayEvent>>,
    sender: Mutex<Option<mpsc::Sender<GatewayEvent>>>,
    /// Submitted orders, in submission order
    orders: Mutex<Vec<MarketOrder>>,
    /// Symbols whose orders are rejected
    reject_symbols: Mutex<HashSet<String>>,
    /// Remaining connect attempts that fail
    connect_failures: Mutex<u32>,
    fail_subscriptions: Mutex<bool>,
    order_counter: Mutex<OrderId>,
    connects: Mutex<u32>,
    global_cancels: Mutex<u32>,
    disconnects: Mutex<u32>,
}

impl StubGateway {
    /// Create a stub managing a single account.
    pub fn new(account: impl Into<AccountId>) -> Self {
        Self {
            accounts: vec![account.into()],
            positions: Mutex::new(Vec::new()),
            account_values: Mutex::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            sender: Mutex::new(None),
            orders: Mutex::new(Vec::new()),
            reject_symbols: Mutex::new(HashSet::new()),
            connect_failures: Mutex::new(0),
            fail_subscriptions: Mutex::new(false),
            order_counter: Mutex::new(0),
            connects: Mutex::new(0),
            global_cancels: Mutex::new(0),
            disconnects: Mutex::new(0),
        }
    }

    /// Seed a position reported by `request_positions`.
    pub fn with_position(self, position: Position) -> Self {
        lock(&self.positions).push(position);
        self
    }

    /// Seed an account value reported by `request_account_summary`.
    pub fn with_account_value(self, value: AccountValue) -> Self {
        lock(&self.account_values).push(value);
        self
    }

    /// Queue an event delivered after the PnL subscription.
    pub fn with_event(self, event: GatewayEvent) -> Self {
        lock(&self.scripted).push_back(event);
        self
    }

    /// Reject every order for `symbol`.
    pub fn reject_orders_for(&self, symbol: &str) {
        lock(&self.reject_symbols).insert(symbol.to_uppercase());
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_connects(&self, count: u32) {
        *lock(&self.connect_failures) = count;
    }

    /// Fail every subscription request.
    pub fn set_fail_subscriptions(&self, fail: bool) {
        *lock(&self.fail_subscriptions) = fail;
    }

    /// Push an event onto the live feed.
    ///
    /// # Errors
    ///
    /// `ExecError::Gateway` when not connected or the receiver is gone.
    pub async fn emit(&self, event: GatewayEvent) -> Result<(), ExecError> {
        let sender = lock(&self.sender).clone();
        match sender {
            Some(tx) => tx
                .send(event)
                .await
                .map_err(|_| ExecError::Gateway("Event feed closed".to_string())),
            None => Err(ExecError::Gateway("Not connected".to_string())),
        }
    }

    /// Drop the sending half so the feed ends.
    pub fn close_feed(&self) {
        lock(&self.sender).take();
    }

    /// Orders submitted so far.
    pub fn submitted_orders(&self) -> Vec<MarketOrder> {
        lock(&self.orders).clone()
    }

    pub fn connect_count(&self) -> u32 {
        *lock(&self.connects)
    }

    pub fn global_cancel_count(&self) -> u32 {
        *lock(&self.global_cancels)
    }

    pub fn disconnect_count(&self) -> u32 {
        *lock(&self.disconnects)
    }

    fn check_subscription(&self, what: &str) -> Result<(), ExecError> {
        if *lock(&self.fail_subscriptions) {
            return Err(ExecError::Subscription(format!("Simulated {} failure", what)));
        }
        Ok(())
    }

    async fn send_all(&self, events: Vec<GatewayEvent>) -> Result<(), ExecError> {
        for event in events {
            self.emit(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerGateway for StubGateway {
    async fn connect(&self, endpoint: &GatewayEndpoint) -> Result<EventStream, ExecError> {
        {
            let mut failures = lock(&self.connect_failures);
            if *failures > 0 {
                *failures -= 1;
                return Err(ExecError::Connection(format!(
                    "Simulated connection refused at {}",
                    endpoint
                )));
            }
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        *lock(&self.sender) = Some(tx);
        *lock(&self.connects) += 1;

        tracing::debug!(%endpoint, "Stub: connected");
        Ok(rx)
    }

    async fn managed_accounts(&self) -> Result<Vec<AccountId>, ExecError> {
        Ok(self.accounts.clone())
    }

    async fn request_open_orders(&self) -> Result<(), ExecError> {
        self.check_subscription("open orders")
    }

    async fn request_positions(&self) -> Result<(), ExecError> {
        self.check_subscription("positions")?;

        let mut events: Vec<GatewayEvent> =
            lock(&self.positions).iter().cloned().map(GatewayEvent::PositionUpdate).collect();
        events.push(GatewayEvent::PositionsComplete);
        self.send_all(events).await
    }

    async fn request_account_summary(&self) -> Result<(), ExecError> {
        self.check_subscription("account summary")?;

        let events = lock(&self.account_values)
            .iter()
            .cloned()
            .map(GatewayEvent::AccountSummary)
            .collect();
        self.send_all(events).await
    }

    async fn request_pnl(&self, account: &str) -> Result<(), ExecError> {
        self.check_subscription("pnl")?;
        tracing::debug!(account, "Stub: pnl subscription");

        let events: Vec<GatewayEvent> = lock(&self.scripted).drain(..).collect();
        self.send_all(events).await
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<OrderAck, ExecError> {
        if lock(&self.reject_symbols).contains(order.symbol().as_str()) {
            return Err(ExecError::OrderRejected(format!(
                "Simulated rejection for {}",
                order.symbol()
            )));
        }

        let order_id = {
            let mut counter = lock(&self.order_counter);
            *counter += 1;
            *counter
        };
        lock(&self.orders).push(order.clone());

        Ok(OrderAck::for_order(order_id, order))
    }

    async fn global_cancel(&self) -> Result<(), ExecError> {
        *lock(&self.global_cancels) += 1;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        *lock(&self.disconnects) += 1;
        self.close_feed();
        Ok(())
    }
}

// =============================================================================
// Stub Notifier
// =============================================================================

/// Stub notifier that records notices.
#[derive(Default)]
pub struct StubNotifier {
    sent: Mutex<Vec<CloseNotice>>,
    fail: Mutex<bool>,
}

impl StubNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every notification fail.
    pub fn set_fail(&self, fail: bool) {
        *lock(&self.fail) = fail;
    }

    /// Notices delivered so far.
    pub fn sent(&self) -> Vec<CloseNotice> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl NotifierPort for StubNotifier {
    async fn notify_close(&self, notice: &CloseNotice) -> Result<(), ExecError> {
        if *lock(&self.fail) {
            return Err(ExecError::Notification("Simulated webhook failure".to_string()));
        }
        lock(&self.sent).push(notice.clone());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
