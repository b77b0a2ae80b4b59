//! Alpaca wire formats, REST client, and trade updates stream.

pub mod api_types;
pub mod http_client;
pub mod messages;
pub mod stream;
pub mod transport;

pub use api_types::{
    AlpacaAccount, AlpacaOrder, AlpacaPosition, LatestQuote, OrderPlacement, OrderReplacement,
};
pub use messages::{TradeEventKind, TradeUpdate};
pub use stream::TradeUpdateStream;
pub use transport::{AlpacaTransport, BrokerTransport};
