//! Sentinel Daemon
//!
//! Watches account PnL and liquidates every open position once the daily
//! loss limit is reached.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (stub gateway, 1% of 30,000)
//! cargo run -p sentineld
//!
//! # Dry run against a recorded session
//! SENTINEL_GATEWAY=replay SENTINEL_REPLAY_FILE=session.jsonl cargo run -p sentineld
//! ```
//!
//! # Environment Variables
//!
//! - `SENTINEL_ENV`: Environment (test, development, production)
//! - `SENTINEL_GATEWAY`: Gateway adapter (stub, replay)
//! - `SENTINEL_GATEWAY_HOST` / `SENTINEL_GATEWAY_PORT` / `SENTINEL_CLIENT_ID`
//! - `SENTINEL_ACCOUNT`: Account id (default: first managed account)
//! - `SENTINEL_LOSS_MODE`: fixed-amount, percent-of-equity, percent-of-starting-equity
//! - `SENTINEL_LOSS_LIMIT`: Limit value (default: 1)
//! - `SENTINEL_LOSS_UNIT`: currency or percent-of-balance (fixed-amount only)
//! - `SENTINEL_ACCOUNT_BALANCE`: Balance for percent-of-balance (default: 30000)
//! - `SENTINEL_WEBHOOK_URL` / `SENTINEL_WEBHOOK_KEY`: Close notifications
//! - `SENTINEL_LOG_DIR`: Daily-rolling log file directory

use sentineld::{logging, Config, Daemon};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing; the guard flushes the log file on exit
    let _log_guard = logging::init(&config.log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        endpoint = %config.gateway.endpoint,
        "Sentinel Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::new(config);
    daemon.run().await?;

    Ok(())
}
