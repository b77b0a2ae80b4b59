//! Brokerage transport port and its live Alpaca implementation.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::api_types::{
    AlpacaAccount, AlpacaOrder, AlpacaPosition, CryptoQuoteEnvelope, LatestQuote, OrderPlacement,
    OrderReplacement, StockQuoteEnvelope,
};
use super::http_client::AlpacaHttpClient;
use super::messages::TradeUpdate;
use super::stream::TradeUpdateStream;
use crate::config::AlpacaConfig;
use crate::error::AlpacaError;

/// Capacity of the trade update broadcast channel.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Port over the brokerage REST API and trade updates stream.
///
/// The gateway talks only to this trait; tests substitute a scripted
/// implementation.
#[async_trait]
pub trait BrokerTransport: Send + Sync + 'static {
    /// Open the trade updates stream and complete its handshake.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection or handshake fails.
    async fn connect(&self) -> Result<(), AlpacaError>;

    /// Close the trade updates stream.
    async fn disconnect(&self);

    /// Subscribe to classified trade updates.
    fn trade_updates(&self) -> broadcast::Receiver<TradeUpdate>;

    /// Submit a new order.
    ///
    /// # Errors
    ///
    /// Returns an error when the brokerage refuses the submission.
    async fn place_order(&self, placement: &OrderPlacement) -> Result<AlpacaOrder, AlpacaError>;

    /// Replace an existing order's quantity and prices.
    ///
    /// # Errors
    ///
    /// Returns an error when the brokerage refuses the replacement.
    async fn replace_order(
        &self,
        broker_id: &str,
        replacement: &OrderReplacement,
    ) -> Result<AlpacaOrder, AlpacaError>;

    /// Request cancellation of an existing order.
    ///
    /// # Errors
    ///
    /// Returns an error when the brokerage refuses the cancellation.
    async fn cancel_order(&self, broker_id: &str) -> Result<(), AlpacaError>;

    /// Fetch all currently open orders.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn open_orders(&self) -> Result<Vec<AlpacaOrder>, AlpacaError>;

    /// Fetch all open positions.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn positions(&self) -> Result<Vec<AlpacaPosition>, AlpacaError>;

    /// Fetch the account snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn account(&self) -> Result<AlpacaAccount, AlpacaError>;

    /// Fetch the latest top-of-book quote for a stock symbol.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn latest_stock_quote(&self, symbol: &str) -> Result<LatestQuote, AlpacaError>;

    /// Fetch the latest top-of-book quote for a crypto pair.
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails.
    async fn latest_crypto_quote(&self, symbol: &str) -> Result<LatestQuote, AlpacaError>;
}

/// Live transport backed by the Alpaca REST APIs and trade updates stream.
pub struct AlpacaTransport {
    config: AlpacaConfig,
    http: AlpacaHttpClient,
    updates: broadcast::Sender<TradeUpdate>,
    cancel: CancellationToken,
    stream_task: Mutex<Option<JoinHandle<Result<(), AlpacaError>>>>,
}

impl AlpacaTransport {
    /// Create a live transport from config.
    ///
    /// # Errors
    ///
    /// Returns an error when credentials are missing or the HTTP client
    /// cannot be built.
    pub fn new(config: AlpacaConfig) -> Result<Self, AlpacaError> {
        let http = AlpacaHttpClient::new(&config)?;
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            http,
            updates,
            cancel: CancellationToken::new(),
            stream_task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl BrokerTransport for AlpacaTransport {
    async fn connect(&self) -> Result<(), AlpacaError> {
        if self.stream_task.lock().is_some() {
            return Ok(());
        }

        let (stream, ready) = TradeUpdateStream::new(
            &self.config,
            self.updates.clone(),
            self.cancel.child_token(),
        );
        let handle = tokio::spawn(stream.run());
        *self.stream_task.lock() = Some(handle);

        // The stream reports once, after its first handshake completes or
        // fails terminally.
        match ready.await {
            Ok(result) => result,
            Err(_) => Err(AlpacaError::Stream(
                "stream task ended before handshake".to_string(),
            )),
        }
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        let task = self.stream_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Stream task join failed");
            }
        }
    }

    fn trade_updates(&self) -> broadcast::Receiver<TradeUpdate> {
        self.updates.subscribe()
    }

    async fn place_order(&self, placement: &OrderPlacement) -> Result<AlpacaOrder, AlpacaError> {
        self.http.post("/v2/orders", placement).await
    }

    async fn replace_order(
        &self,
        broker_id: &str,
        replacement: &OrderReplacement,
    ) -> Result<AlpacaOrder, AlpacaError> {
        self.http
            .patch(&format!("/v2/orders/{broker_id}"), replacement)
            .await
    }

    async fn cancel_order(&self, broker_id: &str) -> Result<(), AlpacaError> {
        self.http.delete(&format!("/v2/orders/{broker_id}")).await
    }

    async fn open_orders(&self) -> Result<Vec<AlpacaOrder>, AlpacaError> {
        self.http.get("/v2/orders?status=open&limit=500").await
    }

    async fn positions(&self) -> Result<Vec<AlpacaPosition>, AlpacaError> {
        self.http.get("/v2/positions").await
    }

    async fn account(&self) -> Result<AlpacaAccount, AlpacaError> {
        self.http.get("/v2/account").await
    }

    async fn latest_stock_quote(&self, symbol: &str) -> Result<LatestQuote, AlpacaError> {
        let envelope: StockQuoteEnvelope = self
            .http
            .data_get(&format!("/v2/stocks/{symbol}/quotes/latest"))
            .await?;
        Ok(envelope.quote)
    }

    async fn latest_crypto_quote(&self, symbol: &str) -> Result<LatestQuote, AlpacaError> {
        let encoded = symbol.replace('/', "%2F");
        let envelope: CryptoQuoteEnvelope = self
            .http
            .data_get(&format!(
                "/v1beta3/crypto/us/latest/quotes?symbols={encoded}"
            ))
            .await?;
        envelope
            .quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| AlpacaError::NotFound {
                resource: symbol.to_string(),
            })
    }
}
