//! Trading-engine-side model.
//!
//! These types mirror the shapes the engine exchanges with the gateway:
//! orders and their lifecycle, securities and account state, the order-status
//! notification channel, and the order lookup port the reconciler uses to
//! resolve fill events.

pub mod events;
pub mod order;
pub mod provider;
pub mod security;

pub use events::{OrderEvent, OrderEventReceiver, OrderEventSender, order_event_channel};
pub use order::{Order, OrderId, OrderKind, OrderSide, OrderStatus, TimeInForce};
pub use provider::OrderProvider;
pub use security::{CashBalance, Holding, Quote, SecurityId, SecurityType};
