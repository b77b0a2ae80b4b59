//! Order-status notification channel.

use rust_decimal::Decimal;
use tokio::sync::mpsc;

use super::order::{OrderId, OrderStatus};

/// A single order-status notification consumed by the engine's transaction
/// bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderEvent {
    /// Engine order identifier.
    pub order_id: OrderId,
    /// Status the order transitioned to.
    pub status: OrderStatus,
    /// Fill price, for fill events.
    pub fill_price: Option<Decimal>,
    /// Signed fill quantity (negative for sells); zero for non-fill events.
    pub fill_quantity: Decimal,
    /// Fee charged for the fill, if known.
    pub fee: Decimal,
    /// Free-form detail (rejection reasons, transport failures).
    pub message: String,
}

impl OrderEvent {
    /// Create a status-only notification with no fill information.
    #[must_use]
    pub fn status(order_id: OrderId, status: OrderStatus, message: impl Into<String>) -> Self {
        Self {
            order_id,
            status,
            fill_price: None,
            fill_quantity: Decimal::ZERO,
            fee: Decimal::ZERO,
            message: message.into(),
        }
    }

    /// Create a fill notification.
    #[must_use]
    pub fn fill(
        order_id: OrderId,
        status: OrderStatus,
        fill_price: Decimal,
        fill_quantity: Decimal,
    ) -> Self {
        Self {
            order_id,
            status,
            fill_price: Some(fill_price),
            fill_quantity,
            fee: Decimal::ZERO,
            message: String::new(),
        }
    }
}

/// Sending half of the notification channel, held by the gateway.
pub type OrderEventSender = mpsc::UnboundedSender<OrderEvent>;

/// Receiving half of the notification channel, held by the engine.
pub type OrderEventReceiver = mpsc::UnboundedReceiver<OrderEvent>;

/// Create the order-status notification channel.
#[must_use]
pub fn order_event_channel() -> (OrderEventSender, OrderEventReceiver) {
    mpsc::unbounded_channel()
}
