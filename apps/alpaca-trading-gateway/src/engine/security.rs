//! Securities, account state, and quote shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Asset class of a security in the engine's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityType {
    /// US equity.
    Equity,
    /// Crypto pair.
    Crypto,
    /// Foreign exchange pair (no brokerage counterpart here).
    Forex,
}

/// Identifier for a tradeable security: ticker plus asset class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityId {
    /// Ticker in the engine's canonical form.
    pub ticker: String,
    /// Asset class.
    pub security_type: SecurityType,
}

impl SecurityId {
    /// Create a new security identifier.
    #[must_use]
    pub fn new(ticker: impl Into<String>, security_type: SecurityType) -> Self {
        Self {
            ticker: ticker.into(),
            security_type,
        }
    }
}

impl fmt::Display for SecurityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.ticker, self.security_type)
    }
}

/// A position held at the brokerage, translated to engine vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    /// Security held.
    pub security: SecurityId,
    /// Signed quantity (negative for short positions).
    pub quantity: Decimal,
    /// Average entry price.
    pub average_price: Decimal,
    /// Current market value.
    pub market_value: Decimal,
    /// Unrealized profit and loss.
    pub unrealized_pnl: Decimal,
}

/// Cash amount in a single currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashBalance {
    /// ISO currency code.
    pub currency: String,
    /// Settled cash amount.
    pub amount: Decimal,
}

/// Latest top-of-book quote for a security.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    /// Security quoted.
    pub security: SecurityId,
    /// Best bid price.
    pub bid: Decimal,
    /// Best ask price.
    pub ask: Decimal,
    /// Quote timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Get the mid price.
    #[must_use]
    pub fn mid_price(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}
