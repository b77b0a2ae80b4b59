//! Synchronous order gateway.
//!
//! Public submit/modify/cancel/query surface. Mutating operations issue a
//! REST request, register the returned brokerage identifier, and block
//! (bounded) until the reconciler releases the completion signal with the
//! matching trade update. Outcomes are reported as booleans plus status
//! notifications; nothing here raises past the boundary.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::alpaca::api_types::parse_decimal;
use crate::alpaca::{BrokerTransport, LatestQuote};
use crate::builder::OrderRequestBuilder;
use crate::config::AlpacaConfig;
use crate::engine::{
    CashBalance, Holding, Order, OrderEvent, OrderEventReceiver, OrderEventSender, OrderProvider,
    OrderStatus, Quote, SecurityId, SecurityType, order_event_channel,
};
use crate::error::GatewayError;
use crate::pending::{AckOutcome, AckWaiter, PendingRequests};
use crate::reconciler::EventReconciler;
use crate::symbols::{AssetClass, SymbolMapper};

/// Outcome of a bounded wait for an acknowledgement.
enum AckWait {
    /// The reconciler released the signal.
    Released(AckOutcome),
    /// The bound elapsed; the request's true outcome is unknown.
    TimedOut,
}

/// Order gateway over a brokerage transport.
///
/// Cheap to clone; all state is shared behind `Arc`s, so clones observe the
/// same pending requests and notification channel.
pub struct TradingGateway<T: BrokerTransport> {
    transport: Arc<T>,
    builder: OrderRequestBuilder,
    mapper: Arc<SymbolMapper>,
    orders: Arc<dyn OrderProvider>,
    pending: Arc<PendingRequests>,
    events: OrderEventSender,
    // Serializes request issuance + registration so no trade update can be
    // reconciled before its registry entry exists. Never held across a wait.
    submission_lock: Arc<tokio::sync::Mutex<()>>,
    ack_timeout: Duration,
    cancel: CancellationToken,
    reconciler_started: Arc<AtomicBool>,
}

impl<T: BrokerTransport> Clone for TradingGateway<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            builder: self.builder.clone(),
            mapper: Arc::clone(&self.mapper),
            orders: Arc::clone(&self.orders),
            pending: Arc::clone(&self.pending),
            events: self.events.clone(),
            submission_lock: Arc::clone(&self.submission_lock),
            ack_timeout: self.ack_timeout,
            cancel: self.cancel.clone(),
            reconciler_started: Arc::clone(&self.reconciler_started),
        }
    }
}

impl<T: BrokerTransport> TradingGateway<T> {
    /// Create a gateway and the notification channel the engine consumes.
    #[must_use]
    pub fn new(
        transport: T,
        mapper: Arc<SymbolMapper>,
        orders: Arc<dyn OrderProvider>,
        config: &AlpacaConfig,
    ) -> (Self, OrderEventReceiver) {
        let (events, events_rx) = order_event_channel();
        let gateway = Self {
            transport: Arc::new(transport),
            builder: OrderRequestBuilder::new(Arc::clone(&mapper)),
            mapper,
            orders,
            pending: Arc::new(PendingRequests::new()),
            events,
            submission_lock: Arc::new(tokio::sync::Mutex::new(())),
            ack_timeout: config.ack_timeout,
            cancel: CancellationToken::new(),
            reconciler_started: Arc::new(AtomicBool::new(false)),
        };
        (gateway, events_rx)
    }

    /// Connect the trade updates stream and start reconciling.
    ///
    /// Returns true iff the stream authenticated.
    pub async fn connect(&self) -> bool {
        if let Err(e) = self.transport.connect().await {
            tracing::error!(error = %e, "Trade updates connection failed");
            return false;
        }

        if !self.reconciler_started.swap(true, Ordering::SeqCst) {
            let reconciler = EventReconciler::new(
                Arc::clone(&self.pending),
                Arc::clone(&self.orders),
                self.events.clone(),
                Arc::clone(&self.submission_lock),
            );
            let updates = self.transport.trade_updates();
            tokio::spawn(reconciler.run(updates, self.cancel.child_token()));
        }

        tracing::info!("Gateway connected");
        true
    }

    /// Stop the reconciler and close the trade updates stream.
    pub async fn disconnect(&self) {
        self.cancel.cancel();
        self.transport.disconnect().await;
        tracing::info!("Gateway disconnected");
    }

    /// Submit a new order and wait (bounded) for its acknowledgement.
    ///
    /// On acceptance the brokerage identifier is appended to the order, its
    /// status advances to `Submitted`, and a `Submitted` notification is
    /// emitted. Timeout returns false with the order untouched; the caller
    /// reconciles via a subsequent open-orders query.
    pub async fn place_order(&self, order: &mut Order) -> bool {
        let placement = match self.builder.build(order) {
            Ok(placement) => placement,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Order request not buildable");
                return false;
            }
        };

        let (broker_id, waiter) = {
            let _guard = self.submission_lock.lock().await;
            let accepted = match self.transport.place_order(&placement).await {
                Ok(accepted) => accepted,
                Err(e) => {
                    self.report_invalid(order, e.to_string());
                    return false;
                }
            };
            match self.pending.register(&accepted.id) {
                Ok(waiter) => (accepted.id, waiter),
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Registration failed");
                    return false;
                }
            }
        };

        match self.await_ack(&broker_id, waiter).await {
            AckWait::Released(AckOutcome::Rejected { reason }) => {
                self.report_invalid(order, reason);
                false
            }
            AckWait::Released(_) => {
                order.broker_ids.push(broker_id.clone());
                order.status = OrderStatus::Submitted;
                self.report_status(order, OrderStatus::Submitted);
                tracing::info!(
                    order_id = %order.id,
                    broker_order_id = %broker_id,
                    security = %order.security,
                    "Order submitted"
                );
                true
            }
            AckWait::TimedOut => false,
        }
    }

    /// Replace an order's quantity/prices and wait for the acknowledgement.
    ///
    /// The most recent brokerage identifier is the modification target; the
    /// replacement's identifier is appended on success.
    pub async fn update_order(&self, order: &mut Order) -> bool {
        let Some(target) = order.current_broker_id().map(ToString::to_string) else {
            tracing::warn!(order_id = %order.id, "Update for order without brokerage id");
            return false;
        };

        let replacement = match self.builder.build_replace(order) {
            Ok(replacement) => replacement,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Replacement not buildable");
                return false;
            }
        };

        let (broker_id, waiter) = {
            let _guard = self.submission_lock.lock().await;
            let replaced = match self.transport.replace_order(&target, &replacement).await {
                Ok(replaced) => replaced,
                Err(e) => {
                    self.report_invalid(order, e.to_string());
                    return false;
                }
            };
            // The replaced trade update carries the replacement's id.
            match self.pending.register(&replaced.id) {
                Ok(waiter) => (replaced.id, waiter),
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Registration failed");
                    return false;
                }
            }
        };

        match self.await_ack(&broker_id, waiter).await {
            AckWait::Released(AckOutcome::Rejected { reason }) => {
                self.report_invalid(order, reason);
                false
            }
            AckWait::Released(_) => {
                order.broker_ids.push(broker_id.clone());
                order.status = OrderStatus::UpdateSubmitted;
                self.report_status(order, OrderStatus::UpdateSubmitted);
                tracing::info!(
                    order_id = %order.id,
                    broker_order_id = %broker_id,
                    "Order replacement submitted"
                );
                true
            }
            AckWait::TimedOut => false,
        }
    }

    /// Cancel an order and wait for the acknowledgement.
    ///
    /// Short-circuits without a transport call when the order is already
    /// filled or canceled locally.
    pub async fn cancel_order(&self, order: &mut Order) -> bool {
        if matches!(order.status, OrderStatus::Filled | OrderStatus::Canceled) {
            tracing::warn!(
                order_id = %order.id,
                status = ?order.status,
                "Cancel for already-terminal order, skipping"
            );
            return false;
        }

        let Some(target) = order.current_broker_id().map(ToString::to_string) else {
            tracing::warn!(order_id = %order.id, "Cancel for order without brokerage id");
            return false;
        };

        let waiter = {
            let _guard = self.submission_lock.lock().await;
            if let Err(e) = self.transport.cancel_order(&target).await {
                self.report_invalid(order, e.to_string());
                return false;
            }
            match self.pending.register(&target) {
                Ok(waiter) => waiter,
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "Registration failed");
                    return false;
                }
            }
        };

        match self.await_ack(&target, waiter).await {
            AckWait::Released(AckOutcome::Rejected { reason }) => {
                self.report_invalid(order, reason);
                false
            }
            AckWait::Released(_) => {
                order.status = OrderStatus::Canceled;
                self.report_status(order, OrderStatus::Canceled);
                tracing::info!(
                    order_id = %order.id,
                    broker_order_id = %target,
                    "Order canceled"
                );
                true
            }
            AckWait::TimedOut => false,
        }
    }

    /// Fetch all open orders, reconstructed into engine orders.
    ///
    /// Orders referencing tickers outside the catalog are logged and
    /// skipped rather than failing the whole query.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport request fails.
    pub async fn open_orders(&self) -> Result<Vec<Order>, GatewayError> {
        let brokerage_orders = self.transport.open_orders().await?;

        let mut orders = Vec::with_capacity(brokerage_orders.len());
        for brokerage in &brokerage_orders {
            match self.builder.reconstruct(brokerage) {
                Ok(order) => orders.push(order),
                Err(e) => {
                    tracing::warn!(
                        broker_order_id = %brokerage.id,
                        symbol = %brokerage.symbol,
                        error = %e,
                        "Skipping unreconstructable open order"
                    );
                }
            }
        }
        Ok(orders)
    }

    /// Fetch open positions as engine holdings.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport request fails.
    pub async fn holdings(&self) -> Result<Vec<Holding>, GatewayError> {
        let positions = self.transport.positions().await?;

        let mut holdings = Vec::with_capacity(positions.len());
        for position in &positions {
            let Some(asset_class) = AssetClass::parse(&position.asset_class) else {
                tracing::warn!(
                    symbol = %position.symbol,
                    asset_class = %position.asset_class,
                    "Skipping position in unsupported asset class"
                );
                continue;
            };
            match self.mapper.to_engine(asset_class, &position.symbol) {
                Ok(security) => holdings.push(Holding {
                    security,
                    quantity: parse_decimal(&position.qty),
                    average_price: parse_decimal(&position.avg_entry_price),
                    market_value: parse_decimal(&position.market_value),
                    unrealized_pnl: parse_decimal(&position.unrealized_pl),
                }),
                Err(e) => {
                    tracing::warn!(symbol = %position.symbol, error = %e, "Skipping position");
                }
            }
        }
        Ok(holdings)
    }

    /// Fetch settled cash balances.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport request fails.
    pub async fn cash_balance(&self) -> Result<Vec<CashBalance>, GatewayError> {
        let account = self.transport.account().await?;
        Ok(vec![CashBalance {
            currency: account.currency,
            amount: parse_decimal(&account.cash),
        }])
    }

    /// Fetch the latest top-of-book quote for a security.
    ///
    /// Each security type routes to its own quote source.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedSecurity` for asset classes with no quote source
    /// and propagates transport failures.
    pub async fn latest_quote(&self, security: &SecurityId) -> Result<Quote, GatewayError> {
        let (_, ticker) = self.mapper.to_brokerage(security)?;

        let quote: LatestQuote = match security.security_type {
            SecurityType::Equity => self.transport.latest_stock_quote(&ticker).await?,
            SecurityType::Crypto => self.transport.latest_crypto_quote(&ticker).await?,
            SecurityType::Forex => {
                return Err(GatewayError::UnsupportedSecurity(security.to_string()));
            }
        };

        Ok(Quote {
            security: security.clone(),
            bid: quote.bid_price,
            ask: quote.ask_price,
            timestamp: quote.timestamp,
        })
    }

    /// Wait for the completion signal, bounded by the configured timeout.
    async fn await_ack(&self, broker_id: &str, waiter: AckWaiter) -> AckWait {
        match tokio::time::timeout(self.ack_timeout, waiter).await {
            Ok(Ok(outcome)) => AckWait::Released(outcome),
            Ok(Err(_)) => {
                // The sender was dropped without firing; treat like a timeout.
                tracing::warn!(broker_order_id = %broker_id, "Completion signal dropped");
                self.pending.expire(broker_id);
                AckWait::TimedOut
            }
            Err(_) => {
                self.pending.expire(broker_id);
                tracing::warn!(
                    broker_order_id = %broker_id,
                    timeout_ms = self.ack_timeout.as_millis(),
                    "Timed out waiting for acknowledgement"
                );
                AckWait::TimedOut
            }
        }
    }

    /// Mark the order invalid and notify the engine with the failure detail.
    fn report_invalid(&self, order: &mut Order, message: String) {
        tracing::warn!(order_id = %order.id, message = %message, "Order failed");
        order.status = OrderStatus::Invalid;
        let _ = self.events.send(OrderEvent::status(
            order.id.clone(),
            OrderStatus::Invalid,
            message,
        ));
    }

    /// Notify the engine of a status transition with no fill information.
    fn report_status(&self, order: &Order, status: OrderStatus) {
        let _ = self
            .events
            .send(OrderEvent::status(order.id.clone(), status, String::new()));
    }
}
