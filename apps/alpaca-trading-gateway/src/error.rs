//! Error taxonomy for the gateway.

use thiserror::Error;

/// Errors from the Alpaca transport layer (REST and streaming).
#[derive(Debug, Error, Clone)]
pub enum AlpacaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// API returned an error.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code from the API.
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Order was rejected at submission.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Rate limited.
    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Suggested retry delay in seconds.
        retry_after_secs: u64,
    },

    /// Network error (retryable).
    #[error("Network error: {0}")]
    Network(String),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Max retries exceeded.
    #[error("Max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        /// Path or identifier that was not found.
        resource: String,
    },

    /// Streaming connection failed or closed.
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Errors surfaced at the gateway boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The security's asset class has no brokerage counterpart.
    #[error("unsupported security: {0}")]
    UnsupportedSecurity(String),

    /// The order kind has no brokerage equivalent.
    #[error("unsupported order type: {0}")]
    UnsupportedOrderType(String),

    /// A brokerage ticker could not be resolved in the asset catalog.
    #[error("unknown symbol: {asset_class}/{ticker}")]
    UnknownSymbol {
        /// Brokerage asset class.
        asset_class: String,
        /// Brokerage ticker.
        ticker: String,
    },

    /// A request is already pending for this brokerage identifier.
    #[error("request already pending for broker order {0}")]
    AlreadyPending(String),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] AlpacaError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpaca_error_display() {
        let err = AlpacaError::Api {
            code: "40310000".to_string(),
            message: "insufficient buying power".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "API error: 40310000 - insufficient buying power"
        );
    }

    #[test]
    fn gateway_error_wraps_transport() {
        let err: GatewayError = AlpacaError::AuthenticationFailed.into();
        assert!(matches!(err, GatewayError::Transport(_)));
    }

    #[test]
    fn unknown_symbol_display() {
        let err = GatewayError::UnknownSymbol {
            asset_class: "us_equity".to_string(),
            ticker: "ZZZZ".to_string(),
        };
        assert_eq!(err.to_string(), "unknown symbol: us_equity/ZZZZ");
    }
}
