//! Trade update reconciliation.
//!
//! Consumes classified trade updates and translates them into two effects:
//! releasing callers blocked on an acknowledgement, and forwarding fill
//! notifications to the engine.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::alpaca::{TradeEventKind, TradeUpdate};
use crate::engine::{OrderEvent, OrderEventSender, OrderProvider, OrderStatus};
use crate::pending::{AckOutcome, PendingRequests};

/// Reconciles asynchronous trade updates against in-flight requests and the
/// engine's order book.
pub struct EventReconciler {
    pending: Arc<PendingRequests>,
    orders: Arc<dyn OrderProvider>,
    events: OrderEventSender,
    // Shared with the request path. Acquiring it before resolving an
    // acknowledgement orders the resolution after any registration that is
    // mid-flight, so an ack arriving between issuance and registration
    // cannot be lost.
    submission_lock: Arc<tokio::sync::Mutex<()>>,
}

impl EventReconciler {
    /// Create a reconciler.
    #[must_use]
    pub fn new(
        pending: Arc<PendingRequests>,
        orders: Arc<dyn OrderProvider>,
        events: OrderEventSender,
        submission_lock: Arc<tokio::sync::Mutex<()>>,
    ) -> Self {
        Self {
            pending,
            orders,
            events,
            submission_lock,
        }
    }

    /// Consume trade updates until the channel closes or shutdown.
    pub async fn run(self, mut updates: broadcast::Receiver<TradeUpdate>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Reconciler cancelled");
                    return;
                }
                msg = updates.recv() => match msg {
                    Ok(update) => self.handle(&update).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Reconciler lagged behind trade updates");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Trade update channel closed");
                        return;
                    }
                },
            }
        }
    }

    /// Apply one trade update.
    pub async fn handle(&self, update: &TradeUpdate) {
        match update.kind {
            // The order is queued at the brokerage but not yet at the
            // exchange; the acknowledgement comes with the next event.
            TradeEventKind::PendingNew => {
                tracing::debug!(broker_order_id = %update.order_id, "Order pending");
            }
            TradeEventKind::New => {
                self.resolve_ack(&update.order_id, AckOutcome::Accepted)
                    .await;
            }
            TradeEventKind::Rejected => {
                self.resolve_ack(
                    &update.order_id,
                    AckOutcome::Rejected {
                        reason: format!("order rejected by brokerage ({})", update.symbol),
                    },
                )
                .await;
            }
            TradeEventKind::Canceled => {
                self.resolve_ack(&update.order_id, AckOutcome::Canceled)
                    .await;
            }
            TradeEventKind::Replaced => {
                self.resolve_ack(&update.order_id, AckOutcome::Replaced)
                    .await;
            }
            TradeEventKind::Fill | TradeEventKind::PartialFill => self.handle_fill(update),
        }
    }

    /// Release the caller waiting on `broker_id`, if any.
    async fn resolve_ack(&self, broker_id: &str, outcome: AckOutcome) {
        let _guard = self.submission_lock.lock().await;
        match self.pending.resolve(broker_id) {
            Some(signal) => {
                // The waiter dropping first just means it timed out.
                let _ = signal.send(outcome);
            }
            None => {
                tracing::debug!(
                    broker_order_id = %broker_id,
                    "Acknowledgement without a pending request"
                );
            }
        }
    }

    /// Forward a fill to the engine as a signed-quantity notification.
    fn handle_fill(&self, update: &TradeUpdate) {
        let Some(order) = self.orders.find_by_broker_id(&update.order_id) else {
            tracing::warn!(
                broker_order_id = %update.order_id,
                symbol = %update.symbol,
                "Fill for unknown order, dropping"
            );
            return;
        };

        let (Some(price), Some(qty)) = (update.price, update.qty) else {
            tracing::warn!(
                broker_order_id = %update.order_id,
                "Fill without price or quantity, dropping"
            );
            return;
        };

        let status = if update.kind == TradeEventKind::Fill {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        let signed_qty = qty * order.side.quantity_sign();

        tracing::info!(
            order_id = %order.id,
            broker_order_id = %update.order_id,
            status = ?status,
            price = %price,
            quantity = %signed_qty,
            "Fill reconciled"
        );

        // Send failure means the engine hung up; nothing left to notify.
        let _ = self
            .events
            .send(OrderEvent::fill(order.id, status, price, signed_qty));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Order, OrderId, OrderSide, SecurityId, SecurityType, order_event_channel};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    struct MapProvider(HashMap<String, Order>);

    impl OrderProvider for MapProvider {
        fn find_by_broker_id(&self, broker_id: &str) -> Option<Order> {
            self.0.get(broker_id).cloned()
        }
    }

    fn update(kind: TradeEventKind, order_id: &str) -> TradeUpdate {
        TradeUpdate {
            kind,
            order_id: order_id.to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            price: None,
            qty: None,
            timestamp: Utc::now(),
        }
    }

    fn fixture(
        orders: Vec<(&str, Order)>,
    ) -> (
        EventReconciler,
        Arc<PendingRequests>,
        crate::engine::OrderEventReceiver,
    ) {
        let pending = Arc::new(PendingRequests::new());
        let provider = Arc::new(MapProvider(
            orders
                .into_iter()
                .map(|(id, order)| (id.to_string(), order))
                .collect(),
        ));
        let (events, events_rx) = order_event_channel();
        let reconciler = EventReconciler::new(
            Arc::clone(&pending),
            provider,
            events,
            Arc::new(tokio::sync::Mutex::new(())),
        );
        (reconciler, pending, events_rx)
    }

    fn sell_order(broker_id: &str) -> Order {
        let mut order = Order::market(
            OrderId::new("o-1"),
            SecurityId::new("AAPL", SecurityType::Equity),
            OrderSide::Sell,
            dec!(10),
        );
        order.broker_ids.push(broker_id.to_string());
        order
    }

    #[tokio::test]
    async fn new_event_releases_the_waiter_with_accepted() {
        let (reconciler, pending, _events) = fixture(vec![]);
        let waiter = pending.register("a").unwrap();

        reconciler.handle(&update(TradeEventKind::New, "a")).await;

        assert_eq!(waiter.await.unwrap(), AckOutcome::Accepted);
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn rejected_event_releases_with_reason() {
        let (reconciler, pending, _events) = fixture(vec![]);
        let waiter = pending.register("a").unwrap();

        reconciler
            .handle(&update(TradeEventKind::Rejected, "a"))
            .await;

        assert!(matches!(
            waiter.await.unwrap(),
            AckOutcome::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn ack_without_pending_request_is_dropped() {
        let (reconciler, pending, _events) = fixture(vec![]);

        reconciler.handle(&update(TradeEventKind::New, "a")).await;
        reconciler
            .handle(&update(TradeEventKind::Canceled, "a"))
            .await;

        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn pending_new_is_informational_only() {
        let (reconciler, pending, mut events) = fixture(vec![]);
        let _waiter = pending.register("a").unwrap();

        reconciler
            .handle(&update(TradeEventKind::PendingNew, "a"))
            .await;

        // The waiter stays registered and no notification is produced.
        assert_eq!(pending.len(), 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn partial_fill_reports_signed_quantity() {
        let (reconciler, _pending, mut events) = fixture(vec![("a", sell_order("a"))]);

        let mut fill = update(TradeEventKind::PartialFill, "a");
        fill.price = Some(dec!(150.25));
        fill.qty = Some(dec!(4));
        reconciler.handle(&fill).await;

        let event = events.try_recv().unwrap();
        assert_eq!(event.status, OrderStatus::PartiallyFilled);
        assert_eq!(event.fill_price, Some(dec!(150.25)));
        assert_eq!(event.fill_quantity, dec!(-4));
    }

    #[tokio::test]
    async fn full_fill_reports_filled_status() {
        let (reconciler, _pending, mut events) = fixture(vec![("a", sell_order("a"))]);

        let mut fill = update(TradeEventKind::Fill, "a");
        fill.price = Some(dec!(150.00));
        fill.qty = Some(dec!(10));
        reconciler.handle(&fill).await;

        let event = events.try_recv().unwrap();
        assert_eq!(event.status, OrderStatus::Filled);
        assert_eq!(event.fill_quantity, dec!(-10));
    }

    #[tokio::test]
    async fn fill_for_unknown_order_is_dropped() {
        let (reconciler, _pending, mut events) = fixture(vec![]);

        let mut fill = update(TradeEventKind::Fill, "unknown");
        fill.price = Some(dec!(150.00));
        fill.qty = Some(dec!(10));
        reconciler.handle(&fill).await;

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn rejected_releases_only_its_own_waiter() {
        let (reconciler, pending, _events) = fixture(vec![]);
        let waiter_a = pending.register("a").unwrap();
        let _waiter_b = pending.register("b").unwrap();

        reconciler
            .handle(&update(TradeEventKind::Rejected, "a"))
            .await;

        assert!(matches!(
            waiter_a.await.unwrap(),
            AckOutcome::Rejected { .. }
        ));
        assert_eq!(pending.len(), 1);
    }
}
