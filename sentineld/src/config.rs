//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Parsing goes through [`Config::from_lookup`] so any key source (process
//! environment, a map in tests) can be used.

use crate::error::{DaemonError, DaemonResult};
use rust_decimal::Decimal;
use sentinel_engine::{ThresholdConfig, ThresholdMode};
use sentinel_exec::GatewayEndpoint;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment (test, development, production)
    pub environment: Environment,

    /// Broker gateway selection and endpoint
    pub gateway: GatewayConfig,

    /// Monitor loop settings
    pub monitor: MonitorConfig,

    /// Loss threshold, fixed for the process lifetime
    pub threshold: ThresholdConfig,

    /// Close notification webhook (disabled when absent)
    pub webhook: Option<WebhookConfig>,

    /// Log output
    pub log: LogConfig,
}

/// Which gateway adapter to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// In-process scripted gateway
    Stub,
    /// Recorded JSON-lines feed
    Replay,
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub kind: GatewayKind,
    pub endpoint: GatewayEndpoint,
    /// Feed file for the replay gateway
    pub replay_file: Option<PathBuf>,
    /// Pause between replayed events
    pub replay_interval_ms: u64,
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Account to monitor; first managed account when unset
    pub account: Option<String>,
    /// 0 = wait for readiness indefinitely
    pub readiness_timeout_secs: u64,
    /// Connect attempts (1 = no retry)
    pub connect_attempts: u32,
    /// Initial retry backoff, doubled per attempt
    pub connect_backoff_ms: u64,
}

/// Webhook configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    pub key: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Directory for the daily-rolling log file (console only when unset)
    pub dir: Option<PathBuf>,
}

/// Unit of `SENTINEL_LOSS_LIMIT` in fixed-amount mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossUnit {
    /// Limit is a currency amount
    Currency,
    /// Limit is a percentage of `SENTINEL_ACCOUNT_BALANCE`
    PercentOfBalance,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses stubs)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl MonitorConfig {
    /// Readiness deadline, if any
    pub fn readiness_timeout(&self) -> Option<Duration> {
        (self.readiness_timeout_secs > 0).then(|| Duration::from_secs(self.readiness_timeout_secs))
    }

    /// Delay before retry number `retry` (1-based): backoff, 2x backoff, 4x ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(16);
        Duration::from_millis(self.connect_backoff_ms.saturating_mul(factor))
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            account: None,
            readiness_timeout_secs: 0,
            connect_attempts: 1,
            connect_backoff_ms: 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);

        Ok(Self {
            environment: Self::load_environment(&vars)?,
            gateway: Self::load_gateway_config(&vars)?,
            monitor: Self::load_monitor_config(&vars)?,
            threshold: Self::load_threshold_config(&vars)?,
            webhook: Self::load_webhook_config(&vars),
            log: LogConfig { dir: vars.get("SENTINEL_LOG_DIR").map(PathBuf::from) },
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            environment: Environment::Test,
            gateway: GatewayConfig {
                kind: GatewayKind::Stub,
                endpoint: GatewayEndpoint::default(),
                replay_file: None,
                replay_interval_ms: 0,
            },
            monitor: MonitorConfig {
                account: Some("DU000001".to_string()),
                readiness_timeout_secs: 0,
                connect_attempts: 1,
                connect_backoff_ms: 10,
            },
            threshold: ThresholdConfig::default(),
            webhook: None,
            log: LogConfig::default(),
        }
    }

    fn load_environment(vars: &Vars<'_>) -> DaemonResult<Environment> {
        let env_str = vars.get_or("SENTINEL_ENV", "development");

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid SENTINEL_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_gateway_config(vars: &Vars<'_>) -> DaemonResult<GatewayConfig> {
        let kind = match vars.get_or("SENTINEL_GATEWAY", "stub").to_lowercase().as_str() {
            "stub" => GatewayKind::Stub,
            "replay" => GatewayKind::Replay,
            other => {
                return Err(DaemonError::Config(format!(
                    "Invalid SENTINEL_GATEWAY: {}. Expected: stub, replay",
                    other
                )))
            }
        };

        let host = vars.get_or("SENTINEL_GATEWAY_HOST", "127.0.0.1");
        let port = vars.parse_or("SENTINEL_GATEWAY_PORT", 4002u16)?;
        let client_id = vars.parse_or("SENTINEL_CLIENT_ID", 2i32)?;

        let replay_file = vars.get("SENTINEL_REPLAY_FILE").map(PathBuf::from);
        if kind == GatewayKind::Replay && replay_file.is_none() {
            return Err(DaemonError::Config(
                "SENTINEL_REPLAY_FILE is required for the replay gateway".to_string(),
            ));
        }

        Ok(GatewayConfig {
            kind,
            endpoint: GatewayEndpoint::new(host, port, client_id),
            replay_file,
            replay_interval_ms: vars.parse_or("SENTINEL_REPLAY_INTERVAL_MS", 0u64)?,
        })
    }

    fn load_monitor_config(vars: &Vars<'_>) -> DaemonResult<MonitorConfig> {
        let connect_attempts = vars.parse_or("SENTINEL_CONNECT_ATTEMPTS", 1u32)?;
        if connect_attempts == 0 {
            return Err(DaemonError::Config(
                "SENTINEL_CONNECT_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        Ok(MonitorConfig {
            account: vars.get("SENTINEL_ACCOUNT"),
            readiness_timeout_secs: vars.parse_or("SENTINEL_READINESS_TIMEOUT_SECS", 0u64)?,
            connect_attempts,
            connect_backoff_ms: vars.parse_or("SENTINEL_CONNECT_BACKOFF_MS", 1000u64)?,
        })
    }

    fn load_threshold_config(vars: &Vars<'_>) -> DaemonResult<ThresholdConfig> {
        let mode = ThresholdMode::from_str(&vars.get_or("SENTINEL_LOSS_MODE", "fixed-amount"))
            .map_err(|e| DaemonError::Config(e.to_string()))?;
        let limit = vars.decimal_or("SENTINEL_LOSS_LIMIT", Decimal::ONE)?;

        let config = match mode {
            ThresholdMode::FixedAmount => match Self::load_loss_unit(vars)? {
                LossUnit::Currency => ThresholdConfig::fixed_amount(limit),
                LossUnit::PercentOfBalance => {
                    let balance =
                        vars.decimal_or("SENTINEL_ACCOUNT_BALANCE", Decimal::new(30000, 0))?;
                    ThresholdConfig::fixed_amount_from_balance(limit, balance)
                }
            },
            ThresholdMode::PercentOfEquity => ThresholdConfig::percent_of_equity(limit),
            ThresholdMode::PercentOfStartingEquity => {
                let starting = vars
                    .get("SENTINEL_STARTING_EQUITY")
                    .map(|v| parse_decimal("SENTINEL_STARTING_EQUITY", &v))
                    .transpose()?;
                ThresholdConfig::percent_of_starting_equity(limit, starting)
            }
        };

        config.map_err(|e| DaemonError::Config(e.to_string()))
    }

    fn load_loss_unit(vars: &Vars<'_>) -> DaemonResult<LossUnit> {
        match vars.get_or("SENTINEL_LOSS_UNIT", "percent-of-balance").to_lowercase().as_str() {
            "currency" | "amount" => Ok(LossUnit::Currency),
            "percent-of-balance" | "percent" => Ok(LossUnit::PercentOfBalance),
            other => Err(DaemonError::Config(format!(
                "Invalid SENTINEL_LOSS_UNIT: {}. Expected: currency, percent-of-balance",
                other
            ))),
        }
    }

    fn load_webhook_config(vars: &Vars<'_>) -> Option<WebhookConfig> {
        vars.get("SENTINEL_WEBHOOK_URL").map(|url| WebhookConfig {
            url,
            key: vars.get_or("SENTINEL_WEBHOOK_KEY", ""),
        })
    }
}

/// Key lookup with empty values treated as unset
struct Vars<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Vars<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> DaemonResult<T> {
        match self.get(key) {
            Some(val) => val
                .parse::<T>()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }

    fn decimal_or(&self, key: &str, default: Decimal) -> DaemonResult<Decimal> {
        match self.get(key) {
            Some(val) => parse_decimal(key, &val),
            None => Ok(default),
        }
    }
}

fn parse_decimal(key: &str, val: &str) -> DaemonResult<Decimal> {
    Decimal::from_str(val).map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            gateway: GatewayConfig {
                kind: GatewayKind::Stub,
                endpoint: GatewayEndpoint::default(),
                replay_file: None,
                replay_interval_ms: 0,
            },
            monitor: MonitorConfig::default(),
            threshold: ThresholdConfig::default(), // 1% of 30,000
            webhook: None,
            log: LogConfig::default(),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayKind::Stub => write!(f, "stub"),
            GatewayKind::Replay => write!(f, "replay"),
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
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> DaemonResult<Config> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.gateway.kind, GatewayKind::Stub);
        assert_eq!(config.gateway.endpoint.port, 4002);
        assert_eq!(config.gateway.endpoint.client_id, 2);
        assert_eq!(config.monitor.connect_attempts, 1);
        assert!(config.monitor.readiness_timeout().is_none());
        assert!(config.webhook.is_none());
    }

    #[test]
    fn test_default_threshold_is_one_percent_of_30k() {
        let config = load(&[]).unwrap();

        assert_eq!(config.threshold.mode(), ThresholdMode::FixedAmount);
        assert_eq!(config.threshold.limit(), dec!(300));
    }

    #[test]
    fn test_test_config() {
        let config = Config::test();

        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.threshold.limit(), dec!(300));
    }

    #[test]
    fn test_currency_unit() {
        let config = load(&[("SENTINEL_LOSS_LIMIT", "1250.50"), ("SENTINEL_LOSS_UNIT", "currency")])
            .unwrap();
        assert_eq!(config.threshold.limit(), dec!(1250.50));
    }

    #[test]
    fn test_percent_of_starting_equity() {
        let config = load(&[
            ("SENTINEL_LOSS_MODE", "percent-of-starting-equity"),
            ("SENTINEL_LOSS_LIMIT", "2"),
            ("SENTINEL_STARTING_EQUITY", "50000"),
        ])
        .unwrap();

        assert_eq!(config.threshold.mode(), ThresholdMode::PercentOfStartingEquity);
        assert_eq!(config.threshold.starting_equity(), Some(dec!(50000)));
    }

    #[test]
    fn test_replay_requires_file() {
        assert!(matches!(
            load(&[("SENTINEL_GATEWAY", "replay")]),
            Err(DaemonError::Config(_))
        ));

        let config = load(&[
            ("SENTINEL_GATEWAY", "replay"),
            ("SENTINEL_REPLAY_FILE", "/tmp/feed.jsonl"),
        ])
        .unwrap();
        assert_eq!(config.gateway.kind, GatewayKind::Replay);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("SENTINEL_ENV", "staging")]).is_err());
        assert!(load(&[("SENTINEL_GATEWAY_PORT", "not-a-port")]).is_err());
        assert!(load(&[("SENTINEL_LOSS_MODE", "trailing")]).is_err());
        assert!(load(&[("SENTINEL_LOSS_LIMIT", "0")]).is_err());
        assert!(load(&[("SENTINEL_CONNECT_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn test_empty_values_use_defaults() {
        let config = load(&[("SENTINEL_ACCOUNT", "  "), ("SENTINEL_GATEWAY_PORT", "")]).unwrap();
        assert!(config.monitor.account.is_none());
        assert_eq!(config.gateway.endpoint.port, 4002);
    }

    #[test]
    fn test_webhook_enabled_by_url() {
        let config = load(&[
            ("SENTINEL_WEBHOOK_URL", "https://hooks.example.com/webhook"),
            ("SENTINEL_WEBHOOK_KEY", "WebhookReceived:abc"),
        ])
        .unwrap();

        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.url, "https://hooks.example.com/webhook");
        assert_eq!(webhook.key, "WebhookReceived:abc");
    }

    #[test]
    fn test_backoff_doubles() {
        let monitor = MonitorConfig { connect_backoff_ms: 500, ..MonitorConfig::default() };

        assert_eq!(monitor.backoff(1), Duration::from_millis(500));
        assert_eq!(monitor.backoff(2), Duration::from_millis(1000));
        assert_eq!(monitor.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn test_readiness_timeout() {
        let config = load(&[("SENTINEL_READINESS_TIMEOUT_SECS", "30")]).unwrap();
        assert_eq!(config.monitor.readiness_timeout(), Some(Duration::from_secs(30)));
    }
}
