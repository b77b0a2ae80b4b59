//! Trade updates WebSocket client.
//!
//! Connects to the trade updates stream, completes the authenticate-then-listen
//! handshake, and fans classified updates out over a broadcast channel.
//! Reconnects with exponential backoff and full jitter when the connection
//! drops.

use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::messages::{self, StreamMessage, TradeUpdate};
use crate::config::{AlpacaConfig, StreamConfig};
use crate::error::AlpacaError;

/// Trade updates stream client.
///
/// `run` owns the connection loop; classified updates fan out through the
/// broadcast sender supplied at construction.
pub struct TradeUpdateStream {
    url: String,
    api_key: String,
    api_secret: String,
    config: StreamConfig,
    updates: broadcast::Sender<TradeUpdate>,
    cancel: CancellationToken,
    // Fires once, after the first successful handshake or on terminal failure.
    ready: Option<oneshot::Sender<Result<(), AlpacaError>>>,
}

impl TradeUpdateStream {
    /// Create a stream client from config.
    ///
    /// Returns the client together with the receiving half of the readiness
    /// signal, which resolves after the first handshake completes.
    #[must_use]
    pub fn new(
        config: &AlpacaConfig,
        updates: broadcast::Sender<TradeUpdate>,
        cancel: CancellationToken,
    ) -> (Self, oneshot::Receiver<Result<(), AlpacaError>>) {
        let (ready_tx, ready_rx) = oneshot::channel();
        let stream = Self {
            url: config.stream_url().to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            config: config.stream.clone(),
            updates,
            cancel,
            ready: Some(ready_tx),
        };
        (stream, ready_rx)
    }

    /// Run the connection loop until cancelled or reconnects are exhausted.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` when the brokerage refuses the
    /// credentials, or `Stream` when reconnect attempts are exhausted.
    pub async fn run(mut self) -> Result<(), AlpacaError> {
        let mut policy = ReconnectPolicy::new(&self.config);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Trade updates stream cancelled");
                return Ok(());
            }

            match self.connect_and_stream(&mut policy).await {
                Ok(()) => {
                    tracing::info!("Trade updates stream closed gracefully");
                    return Ok(());
                }
                // Bad credentials will not improve on retry.
                Err(AlpacaError::AuthenticationFailed) => {
                    self.report_ready(Err(AlpacaError::AuthenticationFailed));
                    return Err(AlpacaError::AuthenticationFailed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Trade updates connection error");

                    if let Some(delay) = policy.next_backoff() {
                        tracing::info!(
                            attempt = policy.current_attempt(),
                            delay_ms = delay.as_millis(),
                            "Reconnecting to trade updates stream"
                        );
                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                tracing::info!("Cancelled during reconnect delay");
                                return Ok(());
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        let err = AlpacaError::Stream(format!(
                            "reconnect attempts exhausted after {}",
                            policy.current_attempt()
                        ));
                        self.report_ready(Err(err.clone()));
                        return Err(err);
                    }
                }
            }
        }
    }

    /// Connect, authenticate, and stream until error or cancellation.
    async fn connect_and_stream(
        &mut self,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), AlpacaError> {
        tracing::info!(url = %self.url, "Connecting to trade updates stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.url)
            .await
            .map_err(|e| AlpacaError::Stream(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let auth = messages::authenticate_request(&self.api_key, &self.api_secret);
        send_json(&mut write, &auth).await?;

        tokio::time::timeout(
            self.config.auth_timeout,
            Self::complete_handshake(&mut write, &mut read),
        )
        .await
        .map_err(|_| AlpacaError::Stream("handshake timed out".to_string()))??;

        tracing::info!("Trade updates stream listening");
        policy.reset();
        self.report_ready(Ok(()));

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(()),
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    // The trade updates stream delivers frames as binary.
                    Some(Ok(Message::Binary(data))) => {
                        match String::from_utf8(data.to_vec()) {
                            Ok(text) => self.handle_frame(&text),
                            Err(_) => {
                                tracing::warn!(len = data.len(), "Non-UTF8 binary frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| AlpacaError::Stream(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Server sent close frame");
                        return Err(AlpacaError::Stream("connection closed".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(AlpacaError::Stream(e.to_string())),
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return Err(AlpacaError::Stream("connection closed".to_string()));
                    }
                },
            }
        }
    }

    /// Drive the authenticate-then-listen handshake to completion.
    async fn complete_handshake<W, R>(write: &mut W, read: &mut R) -> Result<(), AlpacaError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
        R: StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = read
                .next()
                .await
                .ok_or_else(|| AlpacaError::Stream("connection closed during handshake".to_string()))?
                .map_err(|e| AlpacaError::Stream(e.to_string()))?;

            let text = match msg {
                Message::Text(text) => text.to_string(),
                Message::Binary(data) => String::from_utf8(data.to_vec())
                    .map_err(|_| AlpacaError::Stream("non-UTF8 handshake frame".to_string()))?,
                Message::Ping(data) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| AlpacaError::Stream(e.to_string()))?;
                    continue;
                }
                _ => continue,
            };

            match serde_json::from_str::<StreamMessage>(&text) {
                Ok(StreamMessage::Authorization(data)) => {
                    if !data.is_authorized() {
                        return Err(AlpacaError::AuthenticationFailed);
                    }
                    tracing::info!("Trade updates authenticated");
                    send_json(write, &messages::listen_request()).await?;
                }
                Ok(StreamMessage::Listening(data)) => {
                    tracing::info!(streams = ?data.streams, "Listening to trade updates");
                    return Ok(());
                }
                Ok(StreamMessage::TradeUpdates(_)) | Err(_) => {
                    tracing::debug!("Ignoring frame during handshake");
                }
            }
        }
    }

    /// Decode a frame and fan trade updates out to subscribers.
    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<StreamMessage>(text) {
            Ok(StreamMessage::TradeUpdates(data)) => {
                if let Some(update) = data.classify() {
                    tracing::debug!(
                        event = ?update.kind,
                        order_id = %update.order_id,
                        "Trade update received"
                    );
                    // Errors only mean there are no subscribers yet.
                    let _ = self.updates.send(update);
                } else {
                    tracing::warn!(event = %data.event, "Unhandled trade update event");
                }
            }
            Ok(StreamMessage::Authorization(_) | StreamMessage::Listening(_)) => {}
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable stream frame");
            }
        }
    }

    /// Fire the readiness signal; a no-op after the first call.
    fn report_ready(&mut self, result: Result<(), AlpacaError>) {
        if let Some(tx) = self.ready.take() {
            let _ = tx.send(result);
        }
    }
}

/// Serialize and send one JSON frame.
async fn send_json<W>(write: &mut W, value: &serde_json::Value) -> Result<(), AlpacaError>
where
    W: SinkExt<Message> + Unpin,
    W::Error: std::fmt::Display,
{
    let json =
        serde_json::to_string(value).map_err(|e| AlpacaError::JsonParse(e.to_string()))?;
    write
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| AlpacaError::Stream(e.to_string()))
}

/// Reconnection policy with exponential backoff and full jitter.
///
/// Implements the "Full Jitter" algorithm recommended by AWS:
/// <https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/>
#[derive(Debug)]
pub struct ReconnectPolicy {
    initial_backoff: std::time::Duration,
    max_backoff: std::time::Duration,
    multiplier: f64,
    max_attempts: u32,
    current_attempt: u32,
}

impl ReconnectPolicy {
    /// Create a reconnect policy from stream configuration.
    #[must_use]
    pub const fn new(config: &StreamConfig) -> Self {
        Self {
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
            max_attempts: config.max_reconnect_attempts,
            current_attempt: 0,
        }
    }

    /// Calculate the next backoff duration with jitter.
    ///
    /// Returns `None` if max attempts have been exceeded.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn next_backoff(&mut self) -> Option<std::time::Duration> {
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        let base_ms = self.initial_backoff.as_millis() as f64;
        let exponential = base_ms
            * self
                .multiplier
                .powi(i32::try_from(self.current_attempt).unwrap_or(i32::MAX));
        let capped = exponential.min(self.max_backoff.as_millis() as f64);

        // Full jitter: random value between 0 and capped
        let jitter = rand::rng().random_range(0.0..capped);

        self.current_attempt += 1;

        Some(std::time::Duration::from_millis(jitter as u64))
    }

    /// Reset the policy after a successful connection.
    pub const fn reset(&mut self) {
        self.current_attempt = 0;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Check if reconnection should be attempted.
    #[must_use]
    pub const fn should_reconnect(&self) -> bool {
        self.current_attempt < self.max_attempts
    }
}
