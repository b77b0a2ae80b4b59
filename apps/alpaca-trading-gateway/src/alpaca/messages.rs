//! Trade updates stream wire messages.
//!
//! The trade updates stream wraps every frame in a `{"stream": ..., "data":
//! ...}` envelope and uses an authenticate-then-listen handshake that differs
//! from the market data streams.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::engine::OrderSide;

// =============================================================================
// Event Classification
// =============================================================================

/// Classified trade update event.
///
/// This is a closed set: wire strings outside it are rejected at decode so
/// the reconciler can match exhaustively and a new event kind is a compile
/// error rather than a silent fall-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeEventKind {
    /// Order received but not yet routed (informational only).
    PendingNew,
    /// Order accepted.
    New,
    /// Order rejected.
    Rejected,
    /// Order canceled.
    Canceled,
    /// Order replaced; the event carries the replacement's identifier.
    Replaced,
    /// Order completely filled.
    Fill,
    /// Order partially filled.
    PartialFill,
}

impl TradeEventKind {
    /// Parse the wire event string; `None` for anything outside the set.
    #[must_use]
    pub fn parse(event: &str) -> Option<Self> {
        match event {
            "pending_new" => Some(Self::PendingNew),
            "new" | "accepted" => Some(Self::New),
            "rejected" => Some(Self::Rejected),
            "canceled" | "cancelled" => Some(Self::Canceled),
            "replaced" => Some(Self::Replaced),
            "fill" => Some(Self::Fill),
            "partial_fill" => Some(Self::PartialFill),
            _ => None,
        }
    }
}

/// A classified trade update, ready for reconciliation.
#[derive(Debug, Clone)]
pub struct TradeUpdate {
    /// Event kind.
    pub kind: TradeEventKind,
    /// Affected brokerage order identifier (the replacement's identifier for
    /// `Replaced` events).
    pub order_id: String,
    /// Ticker traded.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Fill price, for fill events.
    pub price: Option<Decimal>,
    /// Fill quantity, for fill events (always positive on the wire).
    pub qty: Option<Decimal>,
    /// Event timestamp.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Incoming Envelopes
// =============================================================================

/// Incoming stream frame, tagged by stream name.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "stream", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Authorization response.
    Authorization(AuthorizationData),
    /// Listening confirmation.
    Listening(ListeningData),
    /// Trade update.
    TradeUpdates(TradeUpdateData),
}

/// Authorization response data.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationData {
    /// `authorized` or `unauthorized`.
    pub status: String,
    /// Echoed action.
    pub action: String,
}

impl AuthorizationData {
    /// Check if authorization succeeded.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.status == "authorized"
    }
}

/// Listening confirmation data.
#[derive(Debug, Clone, Deserialize)]
pub struct ListeningData {
    /// Streams now being delivered.
    pub streams: Vec<String>,
}

/// Trade update payload.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeUpdateData {
    /// Raw event string.
    pub event: String,
    /// Fill price, for fill events.
    #[serde(default)]
    pub price: Option<String>,
    /// Fill quantity, for fill events.
    #[serde(default)]
    pub qty: Option<String>,
    /// Event timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// Affected order.
    pub order: OrderSummary,
}

/// The order object embedded in a trade update.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    /// Brokerage order identifier.
    pub id: String,
    /// Ticker.
    pub symbol: String,
    /// Order side.
    pub side: String,
    /// Identifier of the order that replaced this one, on `replaced` events.
    #[serde(default)]
    pub replaced_by: Option<String>,
}

impl TradeUpdateData {
    /// Classify the payload into a `TradeUpdate`.
    ///
    /// Returns `None` when the event string is outside the supported set;
    /// the caller logs and drops such frames.
    #[must_use]
    pub fn classify(&self) -> Option<TradeUpdate> {
        let kind = TradeEventKind::parse(&self.event)?;

        // A replaced event affects the replacement's identifier.
        let order_id = if kind == TradeEventKind::Replaced {
            self.order
                .replaced_by
                .clone()
                .unwrap_or_else(|| self.order.id.clone())
        } else {
            self.order.id.clone()
        };

        let side = if self.order.side == "sell" {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        Some(TradeUpdate {
            kind,
            order_id,
            symbol: self.order.symbol.clone(),
            side,
            price: self.price.as_deref().and_then(|p| p.parse().ok()),
            qty: self.qty.as_deref().and_then(|q| q.parse().ok()),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

// =============================================================================
// Outgoing Requests
// =============================================================================

/// Build the authentication frame sent immediately after connecting.
#[must_use]
pub fn authenticate_request(api_key: &str, api_secret: &str) -> serde_json::Value {
    json!({
        "action": "authenticate",
        "data": { "key_id": api_key, "secret_key": api_secret }
    })
}

/// Build the listen frame that subscribes to trade updates.
#[must_use]
pub fn listen_request() -> serde_json::Value {
    json!({
        "action": "listen",
        "data": { "streams": ["trade_updates"] }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn event_kind_parse_closed_set() {
        assert_eq!(TradeEventKind::parse("new"), Some(TradeEventKind::New));
        assert_eq!(TradeEventKind::parse("fill"), Some(TradeEventKind::Fill));
        assert_eq!(
            TradeEventKind::parse("partial_fill"),
            Some(TradeEventKind::PartialFill)
        );
        assert_eq!(
            TradeEventKind::parse("cancelled"),
            Some(TradeEventKind::Canceled)
        );
        assert_eq!(TradeEventKind::parse("pending_cancel"), None);
        assert_eq!(TradeEventKind::parse("calculated"), None);
        assert_eq!(TradeEventKind::parse(""), None);
    }

    #[test]
    fn envelope_decodes_authorization() {
        let json = r#"{"stream":"authorization","data":{"status":"authorized","action":"authenticate"}}"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        match msg {
            StreamMessage::Authorization(data) => assert!(data.is_authorized()),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn envelope_decodes_trade_update_fill() {
        let json = r#"{
            "stream": "trade_updates",
            "data": {
                "event": "fill",
                "price": "150.50",
                "qty": "10",
                "timestamp": "2026-01-05T14:30:00Z",
                "order": {"id": "broker-1", "symbol": "AAPL", "side": "buy"}
            }
        }"#;
        let msg: StreamMessage = serde_json::from_str(json).unwrap();
        let StreamMessage::TradeUpdates(data) = msg else {
            panic!("expected trade update");
        };
        let update = data.classify().unwrap();
        assert_eq!(update.kind, TradeEventKind::Fill);
        assert_eq!(update.order_id, "broker-1");
        assert_eq!(update.price, Some(dec!(150.50)));
        assert_eq!(update.qty, Some(dec!(10)));
        assert_eq!(update.side, OrderSide::Buy);
    }

    #[test]
    fn unknown_event_is_dropped_at_classification() {
        let data = TradeUpdateData {
            event: "pending_replace".to_string(),
            price: None,
            qty: None,
            timestamp: None,
            order: OrderSummary {
                id: "broker-1".to_string(),
                symbol: "AAPL".to_string(),
                side: "buy".to_string(),
                replaced_by: None,
            },
        };
        assert!(data.classify().is_none());
    }

    #[test]
    fn replaced_event_carries_replacement_identifier() {
        let data = TradeUpdateData {
            event: "replaced".to_string(),
            price: None,
            qty: None,
            timestamp: None,
            order: OrderSummary {
                id: "old-id".to_string(),
                symbol: "AAPL".to_string(),
                side: "buy".to_string(),
                replaced_by: Some("new-id".to_string()),
            },
        };
        let update = data.classify().unwrap();
        assert_eq!(update.kind, TradeEventKind::Replaced);
        assert_eq!(update.order_id, "new-id");
    }

    #[test]
    fn outgoing_handshake_frames() {
        let auth = authenticate_request("key", "secret");
        assert_eq!(auth["action"], "authenticate");
        assert_eq!(auth["data"]["key_id"], "key");

        let listen = listen_request();
        assert_eq!(listen["action"], "listen");
        assert_eq!(listen["data"]["streams"][0], "trade_updates");
    }
}
