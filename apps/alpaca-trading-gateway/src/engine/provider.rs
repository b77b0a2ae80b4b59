//! Order lookup port.

use super::order::Order;

/// Port for resolving engine orders by brokerage identifier.
///
/// Implemented by the engine's order bookkeeping. Called from the event
/// dispatch path, so implementations must not block.
pub trait OrderProvider: Send + Sync {
    /// Find the engine order that owns the given brokerage identifier.
    ///
    /// An order may carry several identifiers after replacements; any of
    /// them resolves to the order.
    fn find_by_broker_id(&self, broker_id: &str) -> Option<Order>;
}
