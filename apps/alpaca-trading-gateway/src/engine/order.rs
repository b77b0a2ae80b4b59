//! Engine order representation and its lifecycle value objects.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::security::SecurityId;

/// Unique identifier for an order (engine internal).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Create a new identifier from a string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Side of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Sign applied to fill quantities reported to the engine.
    #[must_use]
    pub const fn quantity_sign(&self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Time-in-force policy for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    /// Valid for the trading day.
    Day,
    /// Good until canceled.
    GoodTilCanceled,
    /// Immediate or cancel.
    ImmediateOrCancel,
    /// Fill or kill.
    FillOrKill,
}

/// Engine-side order status.
///
/// Every transition to a terminal status is driven by exactly one trade
/// update event or one local validation failure, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created but not yet acknowledged by the brokerage.
    New,
    /// Submission acknowledged by the brokerage.
    Submitted,
    /// Replacement request acknowledged by the brokerage.
    UpdateSubmitted,
    /// Order partially filled.
    PartiallyFilled,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Canceled,
    /// Order rejected or failed local validation.
    Invalid,
}

impl OrderStatus {
    /// Returns true if the order can no longer change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Filled | Self::Canceled | Self::Invalid)
    }
}

/// Order kind together with its kind-specific price fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Execute at the current market price.
    Market,
    /// Execute at `limit_price` or better.
    Limit {
        /// Limit price.
        limit_price: Decimal,
    },
    /// Becomes a market order once `stop_price` trades.
    StopMarket {
        /// Stop trigger price.
        stop_price: Decimal,
    },
    /// Becomes a limit order once `stop_price` trades.
    StopLimit {
        /// Stop trigger price.
        stop_price: Decimal,
        /// Limit price after the trigger.
        limit_price: Decimal,
    },
    /// Stop price trails the market by a percentage or an absolute amount.
    ///
    /// Exactly one of the two offsets must be populated.
    TrailingStop {
        /// Trailing offset as a percentage of the market price.
        trail_percent: Option<Decimal>,
        /// Trailing offset in absolute dollars.
        trail_price: Option<Decimal>,
    },
}

impl OrderKind {
    /// Limit price defined by this kind, if any.
    #[must_use]
    pub const fn limit_price(&self) -> Option<Decimal> {
        match self {
            Self::Limit { limit_price } | Self::StopLimit { limit_price, .. } => Some(*limit_price),
            _ => None,
        }
    }

    /// Stop price defined by this kind, if any.
    #[must_use]
    pub const fn stop_price(&self) -> Option<Decimal> {
        match self {
            Self::StopMarket { stop_price } | Self::StopLimit { stop_price, .. } => {
                Some(*stop_price)
            }
            _ => None,
        }
    }
}

/// The trading engine's internal order representation.
///
/// Owned by the engine. The gateway only reads it, appends brokerage
/// identifiers, and advances the status through the documented operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Engine identifier.
    pub id: OrderId,
    /// Security being traded.
    pub security: SecurityId,
    /// Buy or sell.
    pub side: OrderSide,
    /// Requested quantity (always positive; direction comes from `side`).
    pub quantity: Decimal,
    /// Order kind and its prices.
    pub kind: OrderKind,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Current engine-side status.
    pub status: OrderStatus,
    /// Brokerage identifiers accumulated over the order's lifetime.
    ///
    /// An order gains a new identifier on every accepted replacement; the
    /// most recent entry is the current target for modify/cancel.
    pub broker_ids: Vec<String>,
}

impl Order {
    /// Create a new order in the `New` status with no brokerage identifiers.
    #[must_use]
    pub fn new(
        id: OrderId,
        security: SecurityId,
        side: OrderSide,
        quantity: Decimal,
        kind: OrderKind,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            id,
            security,
            side,
            quantity,
            kind,
            time_in_force,
            status: OrderStatus::New,
            broker_ids: Vec::new(),
        }
    }

    /// Create a day market order.
    #[must_use]
    pub fn market(id: OrderId, security: SecurityId, side: OrderSide, quantity: Decimal) -> Self {
        Self::new(
            id,
            security,
            side,
            quantity,
            OrderKind::Market,
            TimeInForce::Day,
        )
    }

    /// Create a day limit order.
    #[must_use]
    pub fn limit(
        id: OrderId,
        security: SecurityId,
        side: OrderSide,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self::new(
            id,
            security,
            side,
            quantity,
            OrderKind::Limit { limit_price },
            TimeInForce::Day,
        )
    }

    /// Most recently assigned brokerage identifier, if any.
    #[must_use]
    pub fn current_broker_id(&self) -> Option<&str> {
        self.broker_ids.last().map(String::as_str)
    }
}
