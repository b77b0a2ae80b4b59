//! Alpaca REST request and response types.
//!
//! These types map directly to Alpaca's REST API format. Numeric fields
//! arrive as strings on the wire and are parsed at the translation boundary.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::OrderStatus;

// ============================================================================
// Order Request Types
// ============================================================================

/// Order submission payload for `POST /v2/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPlacement {
    /// Brokerage ticker.
    pub symbol: String,
    /// Quantity (shares or coins).
    pub qty: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price (for limit and stop-limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// Stop price (for stop and stop-limit orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    /// Trailing offset as a percent (trailing-stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_percent: Option<String>,
    /// Trailing offset in dollars (trailing-stop orders).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_price: Option<String>,
    /// Client order ID.
    pub client_order_id: String,
}

/// Order replacement payload for `PATCH /v2/orders/{id}`.
///
/// Carries quantity plus whichever prices the concrete order kind defines;
/// omitted fields are left unchanged by the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReplacement {
    /// New quantity.
    pub qty: String,
    /// New limit price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    /// New stop price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
}

// ============================================================================
// Order Response Types
// ============================================================================

/// Order snapshot from the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaOrder {
    /// Brokerage order ID (opaque, unique per submission or replacement).
    pub id: String,
    /// Client order ID.
    pub client_order_id: String,
    /// Ticker.
    pub symbol: String,
    /// Asset class (`us_equity` or `crypto`).
    pub asset_class: String,
    /// Requested quantity (as string).
    pub qty: String,
    /// Filled quantity (as string).
    pub filled_qty: String,
    /// Average fill price (as string).
    #[serde(default)]
    pub filled_avg_price: Option<String>,
    /// Order status.
    pub status: String,
    /// Order side.
    pub side: String,
    /// Order type.
    #[serde(rename = "type")]
    pub order_type: String,
    /// Time in force.
    pub time_in_force: String,
    /// Limit price.
    #[serde(default)]
    pub limit_price: Option<String>,
    /// Stop price.
    #[serde(default)]
    pub stop_price: Option<String>,
    /// Trailing offset as a percent.
    #[serde(default)]
    pub trail_percent: Option<String>,
    /// Trailing offset in dollars.
    #[serde(default)]
    pub trail_price: Option<String>,
    /// Submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

// ============================================================================
// Account / Position Types
// ============================================================================

/// Account response from `GET /v2/account`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaAccount {
    /// Account ID.
    pub id: String,
    /// Account currency.
    pub currency: String,
    /// Settled cash balance.
    pub cash: String,
    /// Account equity.
    pub equity: String,
    /// Buying power.
    pub buying_power: String,
}

/// Position response from `GET /v2/positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaPosition {
    /// Ticker.
    pub symbol: String,
    /// Asset class.
    pub asset_class: String,
    /// Signed quantity.
    pub qty: String,
    /// Average entry price.
    pub avg_entry_price: String,
    /// Market value.
    pub market_value: String,
    /// Unrealized P&L.
    pub unrealized_pl: String,
}

// ============================================================================
// Quote Types
// ============================================================================

/// Top-of-book quote payload shared by the stock and crypto endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestQuote {
    /// Best bid price.
    #[serde(rename = "bp")]
    pub bid_price: Decimal,
    /// Best ask price.
    #[serde(rename = "ap")]
    pub ask_price: Decimal,
    /// Quote timestamp.
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
}

/// Envelope for `GET /v2/stocks/{symbol}/quotes/latest`.
#[derive(Debug, Clone, Deserialize)]
pub struct StockQuoteEnvelope {
    /// The quote.
    pub quote: LatestQuote,
}

/// Envelope for `GET /v1beta3/crypto/us/latest/quotes`.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoQuoteEnvelope {
    /// Quotes keyed by symbol.
    pub quotes: std::collections::HashMap<String, LatestQuote>,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error response body from the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct AlpacaErrorResponse {
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
    /// Error message.
    pub message: String,
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parse an Alpaca order status string into the engine's order status.
///
/// Used when reconstructing engine orders from open-order snapshots; the
/// event stream has its own, stricter classification.
#[must_use]
pub fn parse_order_status(status: &str) -> OrderStatus {
    match status {
        "partially_filled" => OrderStatus::PartiallyFilled,
        "filled" => OrderStatus::Filled,
        "canceled" | "cancelled" | "pending_cancel" | "done_for_day" | "expired" => {
            OrderStatus::Canceled
        }
        "rejected" | "suspended" => OrderStatus::Invalid,
        "replaced" => OrderStatus::UpdateSubmitted,
        // new, accepted, pending_new, and anything else still working
        _ => OrderStatus::Submitted,
    }
}

/// Parse a wire decimal string, treating absent or malformed values as zero.
#[must_use]
pub fn parse_decimal(value: &str) -> Decimal {
    value.parse().unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn placement_serializes_without_absent_prices() {
        let placement = OrderPlacement {
            symbol: "AAPL".to_string(),
            qty: "10".to_string(),
            side: "buy".to_string(),
            order_type: "market".to_string(),
            time_in_force: "day".to_string(),
            limit_price: None,
            stop_price: None,
            trail_percent: None,
            trail_price: None,
            client_order_id: "c-1".to_string(),
        };

        let json = serde_json::to_value(&placement).unwrap();
        assert_eq!(json["type"], "market");
        assert!(json.get("limit_price").is_none());
        assert!(json.get("trail_percent").is_none());
    }

    #[test]
    fn order_deserializes_from_api_shape() {
        let json = r#"{
            "id": "broker-1",
            "client_order_id": "c-1",
            "symbol": "AAPL",
            "asset_class": "us_equity",
            "qty": "10",
            "filled_qty": "0",
            "filled_avg_price": null,
            "status": "new",
            "side": "buy",
            "type": "limit",
            "time_in_force": "day",
            "limit_price": "150.00",
            "submitted_at": "2026-01-05T14:30:00Z"
        }"#;

        let order: AlpacaOrder = serde_json::from_str(json).unwrap();
        assert_eq!(order.id, "broker-1");
        assert_eq!(order.order_type, "limit");
        assert_eq!(order.limit_price.as_deref(), Some("150.00"));
        assert!(order.trail_percent.is_none());
    }

    #[test]
    fn parse_order_status_classification() {
        assert_eq!(parse_order_status("new"), OrderStatus::Submitted);
        assert_eq!(parse_order_status("accepted"), OrderStatus::Submitted);
        assert_eq!(
            parse_order_status("partially_filled"),
            OrderStatus::PartiallyFilled
        );
        assert_eq!(parse_order_status("filled"), OrderStatus::Filled);
        assert_eq!(parse_order_status("canceled"), OrderStatus::Canceled);
        assert_eq!(parse_order_status("expired"), OrderStatus::Canceled);
        assert_eq!(parse_order_status("rejected"), OrderStatus::Invalid);
    }

    #[test]
    fn latest_quote_envelope() {
        let json = r#"{"quote": {"ap": 185.52, "bp": 185.50, "t": "2026-01-05T14:30:00Z"}}"#;
        let envelope: StockQuoteEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.quote.bid_price, dec!(185.50));
        assert_eq!(envelope.quote.ask_price, dec!(185.52));
    }

    #[test]
    fn parse_decimal_defaults_to_zero() {
        assert_eq!(parse_decimal("12.5"), dec!(12.5));
        assert_eq!(parse_decimal(""), Decimal::ZERO);
        assert_eq!(parse_decimal("bogus"), Decimal::ZERO);
    }
}
