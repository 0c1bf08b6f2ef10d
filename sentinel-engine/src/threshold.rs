//! Threshold Policy
//!
//! Decides whether a PnL reading breaches the configured loss limit.
//!
//! # Modes
//!
//! | mode                         | observed value                      | breached when            |
//! |------------------------------|-------------------------------------|--------------------------|
//! | `fixed-amount`               | daily PnL                           | `daily <= -amount`       |
//! | `percent-of-equity`          | daily PnL                           | `daily <= -equity * p%`  |
//! | `percent-of-starting-equity` | `(equity - start) / start * 100`    | `change <= -p`           |
//!
//! Boundaries are inclusive. There is no hysteresis or debounce: a single
//! reading across the line is a breach.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use sentinel_domain::{DomainError, PnlReading};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Mode
// =============================================================================

/// How the loss limit is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMode {
    /// Daily PnL against a fixed currency amount
    FixedAmount,
    /// Daily PnL against a percentage of live equity
    PercentOfEquity,
    /// Equity change since start against a percentage
    PercentOfStartingEquity,
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdMode::FixedAmount => write!(f, "fixed-amount"),
            ThresholdMode::PercentOfEquity => write!(f, "percent-of-equity"),
            ThresholdMode::PercentOfStartingEquity => write!(f, "percent-of-starting-equity"),
        }
    }
}

impl FromStr for ThresholdMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed-amount" | "fixed" | "amount" => Ok(ThresholdMode::FixedAmount),
            "percent-of-equity" | "equity" => Ok(ThresholdMode::PercentOfEquity),
            "percent-of-starting-equity" | "starting-equity" => {
                Ok(ThresholdMode::PercentOfStartingEquity)
            }
            other => Err(DomainError::InvalidThreshold(format!(
                "Unknown threshold mode: {}. Expected: fixed-amount, percent-of-equity, percent-of-starting-equity",
                other
            ))),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Loss threshold configuration, immutable after startup
///
/// # Example
///
/// ```
/// # use sentinel_engine::threshold::ThresholdConfig;
/// # use rust_decimal_macros::dec;
/// // 1% of a 30,000 balance, expressed in currency
/// let config = ThresholdConfig::fixed_amount_from_balance(dec!(1), dec!(30000)).unwrap();
/// assert_eq!(config.limit(), dec!(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    mode: ThresholdMode,
    /// Currency amount (fixed-amount) or percentage (percent modes), always positive
    limit: Decimal,
    starting_equity: Option<Decimal>,
}

impl ThresholdConfig {
    /// Breach when daily PnL falls to `-|amount|`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidThreshold` if amount is zero
    pub fn fixed_amount(amount: Decimal) -> Result<Self, DomainError> {
        if amount.is_zero() {
            return Err(DomainError::InvalidThreshold("Loss amount must be nonzero".to_string()));
        }
        Ok(Self {
            mode: ThresholdMode::FixedAmount,
            limit: amount.abs(),
            starting_equity: None,
        })
    }

    /// Fixed-amount limit computed once from a percentage of a supplied balance
    ///
    /// # Errors
    /// Returns `DomainError::InvalidThreshold` if the percentage is outside
    /// (0, 100] or the balance is not positive
    pub fn fixed_amount_from_balance(percent: Decimal, balance: Decimal) -> Result<Self, DomainError> {
        validate_percent(percent)?;
        if balance <= Decimal::ZERO {
            return Err(DomainError::InvalidThreshold(
                "Account balance must be positive".to_string(),
            ));
        }
        Self::fixed_amount(balance * percent / HUNDRED)
    }

    /// Breach when daily PnL falls to `-(equity * percent / 100)`
    pub fn percent_of_equity(percent: Decimal) -> Result<Self, DomainError> {
        validate_percent(percent)?;
        Ok(Self {
            mode: ThresholdMode::PercentOfEquity,
            limit: percent,
            starting_equity: None,
        })
    }

    /// Breach when equity has fallen `percent` below the starting equity
    ///
    /// Without a configured starting equity, the first observed equity
    /// becomes the baseline (see [`ThresholdPolicy`]).
    pub fn percent_of_starting_equity(
        percent: Decimal,
        starting_equity: Option<Decimal>,
    ) -> Result<Self, DomainError> {
        validate_percent(percent)?;
        if let Some(start) = starting_equity {
            if start <= Decimal::ZERO {
                return Err(DomainError::InvalidThreshold(
                    "Starting equity must be positive".to_string(),
                ));
            }
        }
        Ok(Self {
            mode: ThresholdMode::PercentOfStartingEquity,
            limit: percent,
            starting_equity,
        })
    }

    /// Threshold mode
    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// Positive limit value (currency or percentage depending on mode)
    pub fn limit(&self) -> Decimal {
        self.limit
    }

    /// Configured starting equity, if any
    pub fn starting_equity(&self) -> Option<Decimal> {
        self.starting_equity
    }
}

/// 1% of a 30,000 balance: fixed-amount, 300
impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::FixedAmount,
            limit: Decimal::new(300, 0),
            starting_equity: None,
        }
    }
}

impl fmt::Display for ThresholdConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ThresholdMode::FixedAmount => write!(f, "{} <= -{}", self.mode, self.limit),
            _ => write!(f, "{} <= -{}%", self.mode, self.limit),
        }
    }
}

fn validate_percent(percent: Decimal) -> Result<(), DomainError> {
    if percent <= Decimal::ZERO || percent > HUNDRED {
        return Err(DomainError::InvalidThreshold(format!(
            "Percentage must be in (0, 100], got {}",
            percent
        )));
    }
    Ok(())
}

// =============================================================================
// Evaluation
// =============================================================================

/// Outcome of evaluating one reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdCheck {
    pub mode: ThresholdMode,
    /// Daily PnL, or equity change in percent for the starting-equity mode
    pub observed: Decimal,
    /// Negative threshold the observed value is compared against
    pub limit: Decimal,
    pub breached: bool,
}

/// Evaluate `reading` against `config`
///
/// Returns `None` when the mode needs an equity figure the reading lacks,
/// or when the equity (percent-of-equity) or baseline is not positive.
pub fn check(reading: &PnlReading, config: &ThresholdConfig) -> Option<ThresholdCheck> {
    check_with_baseline(reading, config, config.starting_equity)
}

/// Contract: true when the reading is at or beyond the loss limit
pub fn breached(reading: &PnlReading, config: &ThresholdConfig) -> bool {
    check(reading, config).map_or(false, |c| c.breached)
}

fn check_with_baseline(
    reading: &PnlReading,
    config: &ThresholdConfig,
    baseline: Option<Decimal>,
) -> Option<ThresholdCheck> {
    let (observed, limit) = match config.mode {
        ThresholdMode::FixedAmount => (reading.daily_pnl, -config.limit),
        ThresholdMode::PercentOfEquity => {
            let equity = reading.equity.filter(|e| *e > Decimal::ZERO)?;
            (reading.daily_pnl, -(equity * config.limit / HUNDRED))
        }
        ThresholdMode::PercentOfStartingEquity => {
            let equity = reading.equity?;
            let start = baseline.filter(|s| !s.is_zero())?;
            ((equity - start) / start * HUNDRED, -config.limit)
        }
    };

    Some(ThresholdCheck {
        mode: config.mode,
        observed,
        limit,
        breached: observed <= limit,
    })
}

// =============================================================================
// Policy
// =============================================================================

/// Threshold configuration plus the equity baseline captured at runtime
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    config: ThresholdConfig,
    baseline: Option<Decimal>,
}

impl ThresholdPolicy {
    /// Create a policy; the baseline starts at the configured starting equity
    pub fn new(config: ThresholdConfig) -> Self {
        Self {
            baseline: config.starting_equity,
            config,
        }
    }

    /// Configuration in force
    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Starting equity used by the percent-of-starting-equity mode
    pub fn baseline(&self) -> Option<Decimal> {
        self.baseline
    }

    /// Record an equity observation; the first positive one becomes the
    /// baseline when none was configured
    pub fn observe_equity(&mut self, equity: Decimal) {
        if self.config.mode == ThresholdMode::PercentOfStartingEquity
            && self.baseline.is_none()
            && equity > Decimal::ZERO
        {
            tracing::info!(starting_equity = %equity, "Captured starting equity baseline");
            self.baseline = Some(equity);
        }
    }

    /// Evaluate a reading, capturing the baseline from it if needed
    pub fn evaluate(&mut self, reading: &PnlReading) -> Option<ThresholdCheck> {
        if let Some(equity) = reading.equity {
            self.observe_equity(equity);
        }
        check_with_baseline(reading, &self.config, self.baseline)
    }
}

// =============================================================================
// Tests
// =============================================================================
