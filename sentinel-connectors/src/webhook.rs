//! Close-notification webhook.
//!
//! Posts one JSON payload per liquidated position to a trading-bot webhook
//! (TradingView alert format), so downstream bots see a `close_all` signal.
//!
//! # Payload
//!
//! ```json
//! {
//!   "timestamp": 1700000000, "ticker": "AAPL", "currency": "USD",
//!   "timeframe": "S", "clientId": "2", "key": "...", "contract": "stock",
//!   "orderRef": "close_all", "direction": "strategy.close_all",
//!   "metrics": [{"name": "qty", "value": -10000000000}, {"name": "price", "value": 187.5}, ...]
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::info;

use sentinel_domain::CLOSE_ALL_ORDER_REF;
use sentinel_exec::{CloseNotice, ExecError, NotifierPort};

// =============================================================================
// Constants
// =============================================================================

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Quantity sentinel telling the receiver to close the whole position
pub const CLOSE_ALL_QTY_SENTINEL: i64 = -10_000_000_000;

const CLOSE_ALL_DIRECTION: &str = "strategy.close_all";

// =============================================================================
// Payload
// =============================================================================

/// One named metric of the alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: &'static str,
    pub value: Value,
}

impl Metric {
    fn new(name: &'static str, value: impl Into<Value>) -> Self {
        Self { name, value: value.into() }
    }
}

/// Webhook request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Unix seconds
    pub timestamp: i64,
    pub ticker: String,
    pub currency: String,
    pub timeframe: String,
    pub client_id: String,
    pub key: String,
    pub contract: String,
    pub order_ref: String,
    pub direction: String,
    pub metrics: Vec<Metric>,
}

impl WebhookPayload {
    /// Build the close-all alert for `notice`
    pub fn close_all(notice: &CloseNotice, client_id: &str, key: &str) -> Self {
        let price = notice.last_price.to_f64().unwrap_or_default();

        Self {
            timestamp: notice.at.timestamp(),
            ticker: notice.symbol.as_str().to_string(),
            currency: "USD".to_string(),
            timeframe: "S".to_string(),
            client_id: client_id.to_string(),
            key: key.to_string(),
            contract: notice.security_type.label().to_string(),
            order_ref: CLOSE_ALL_ORDER_REF.to_string(),
            direction: CLOSE_ALL_DIRECTION.to_string(),
            metrics: vec![
                Metric::new("entry.limit", 0),
                Metric::new("entry.stop", 0),
                Metric::new("exit.limit", 0),
                Metric::new("exit.stop", 0),
                Metric::new("qty", CLOSE_ALL_QTY_SENTINEL),
                Metric::new("price", price),
            ],
        }
    }
}

// =============================================================================
// Webhook Notifier
// =============================================================================

/// HTTP notifier posting [`WebhookPayload`]s.
pub struct WebhookNotifier {
    /// HTTP client
    client: Client,
    url: String,
    key: String,
    client_id: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// Create a notifier for `url`.
    ///
    /// * `key` - shared secret echoed in the payload's `key` field
    /// * `client_id` - gateway client id, reported as `clientId`
    pub fn new(url: impl Into<String>, key: impl Into<String>, client_id: i32) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            key: key.into(),
            client_id: client_id.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// Override the request timeout (default 10 s)
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn notify_close(&self, notice: &CloseNotice) -> Result<(), ExecError> {
        let payload = WebhookPayload::close_all(notice, &self.client_id, &self.key);

        let response = timeout(
            self.timeout,
            self.client.post(&self.url).json(&payload).send(),
        )
        .await
        .map_err(|_| {
            ExecError::Notification(format!(
                "Webhook timed out after {}ms for {}",
                self.timeout.as_millis(),
                notice.symbol
            ))
        })?
        .map_err(|e| ExecError::Notification(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ExecError::Notification(format!("HTTP {}: {}", status, body)));
        }

        info!(symbol = %notice.symbol, status = status.as_u16(), "Close notification sent");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sentinel_domain::{SecurityType, Symbol};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notice() -> CloseNotice {
        CloseNotice {
            symbol: Symbol::new("AAPL").unwrap(),
            quantity: dec!(100),
            last_price: dec!(187.5),
            security_type: SecurityType::Stock,
            at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload = WebhookPayload::close_all(&notice(), "2", "WebhookReceived:abc");
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            value,
            json!({
                "timestamp": 1_700_000_000,
                "ticker": "AAPL",
                "currency": "USD",
                "timeframe": "S",
                "clientId": "2",
                "key": "WebhookReceived:abc",
                "contract": "stock",
                "orderRef": "close_all",
                "direction": "strategy.close_all",
                "metrics": [
                    {"name": "entry.limit", "value": 0},
                    {"name": "entry.stop", "value": 0},
                    {"name": "exit.limit", "value": 0},
                    {"name": "exit.stop", "value": 0},
                    {"name": "qty", "value": -10_000_000_000i64},
                    {"name": "price", "value": 187.5}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_posts_json_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(json!({"ticker": "AAPL", "orderRef": "close_all"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/webhook", server.uri()), "k", 2);
        notifier.notify_close(&notice()).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_success_status_is_notification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), "k", 2);
        let err = notifier.notify_close(&notice()).await.unwrap_err();

        match err {
            ExecError::Notification(msg) => assert!(msg.contains("502")),
            other => panic!("Expected Notification error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_slow_webhook_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(server.uri(), "k", 2).with_timeout(Duration::from_millis(200));

        let started = std::time::Instant::now();
        let err = notifier.notify_close(&notice()).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        match err {
            ExecError::Notification(msg) => assert!(msg.contains("timed out"), "{}", msg),
            other => panic!("Expected Notification error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_timeout() {
        let notifier = WebhookNotifier::new("http://localhost/webhook", "k", 2);
        assert_eq!(notifier.timeout, Duration::from_secs(REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn test_contract_label_follows_security_type() {
        let mut future = notice();
        future.security_type = SecurityType::Future;

        let payload = WebhookPayload::close_all(&future, "2", "k");
        assert_eq!(payload.contract, "future");
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_notification_error() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/webhook", "k", 2);
        let result = notifier.notify_close(&notice()).await;
        assert!(matches!(result, Err(ExecError::Notification(_))));
    }
}
