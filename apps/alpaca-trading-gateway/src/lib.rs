// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Alpaca Trading Gateway
//!
//! Adapter that lets a trading engine submit, modify, and cancel orders
//! against Alpaca's REST and streaming APIs and reconciles the resulting
//! asynchronous trade updates back into the engine's own order model.
//!
//! # Architecture
//!
//! - `engine`: the trading-engine-side model (orders, securities, the
//!   notification channel, the order lookup port)
//! - `symbols` / `builder`: vocabulary translation between the engine's
//!   types and the brokerage's asset-class/ticker and order payloads
//! - `alpaca`: the brokerage surface (REST client with retry, trade updates
//!   WebSocket stream with reconnect, wire types, the `BrokerTransport` port)
//! - `pending` / `reconciler`: the acknowledgement protocol — a concurrent
//!   registry of single-use completion signals keyed by brokerage order id,
//!   fulfilled by the trade update reconciler
//! - `gateway`: the synchronous facade composing all of the above
//!
//! Mutating operations block the caller (bounded) until the matching trade
//! update arrives; fills are reported independently over the notification
//! channel.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod alpaca;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod pending;
pub mod reconciler;
pub mod symbols;

pub use alpaca::{AlpacaTransport, BrokerTransport, TradeEventKind, TradeUpdate};
pub use builder::OrderRequestBuilder;
pub use config::{AlpacaConfig, AlpacaEnvironment, RetryConfig, StreamConfig};
pub use engine::{
    CashBalance, Holding, Order, OrderEvent, OrderEventReceiver, OrderId, OrderKind, OrderProvider,
    OrderSide, OrderStatus, Quote, SecurityId, SecurityType, TimeInForce,
};
pub use error::{AlpacaError, GatewayError};
pub use gateway::TradingGateway;
pub use pending::{AckOutcome, PendingRequests};
pub use reconciler::EventReconciler;
pub use symbols::{AssetCatalogEntry, AssetClass, SymbolMapper};
