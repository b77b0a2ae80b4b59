//! Symbol translation between engine securities and brokerage assets.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::{SecurityId, SecurityType};
use crate::error::GatewayError;

/// Brokerage asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    /// US equities.
    UsEquity,
    /// Crypto pairs.
    Crypto,
}

impl AssetClass {
    /// Wire representation used by the REST API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UsEquity => "us_equity",
            Self::Crypto => "crypto",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "us_equity" => Some(Self::UsEquity),
            "crypto" => Some(Self::Crypto),
            _ => None,
        }
    }

    /// Engine asset class this brokerage class corresponds to.
    #[must_use]
    pub const fn security_type(&self) -> SecurityType {
        match self {
            Self::UsEquity => SecurityType::Equity,
            Self::Crypto => SecurityType::Crypto,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the brokerage asset catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCatalogEntry {
    /// Asset class.
    pub asset_class: AssetClass,
    /// Brokerage ticker.
    pub ticker: String,
}

impl AssetCatalogEntry {
    /// Create a catalog entry.
    #[must_use]
    pub fn new(asset_class: AssetClass, ticker: impl Into<String>) -> Self {
        Self {
            asset_class,
            ticker: ticker.into(),
        }
    }
}

/// Bidirectional mapper between engine securities and brokerage assets.
///
/// Lookups are pure reads over maps built at construction, so both directions
/// are safe to call from the event dispatch path without blocking it.
#[derive(Debug)]
pub struct SymbolMapper {
    catalog: HashMap<(AssetClass, String), SecurityId>,
}

impl SymbolMapper {
    /// Build a mapper from the brokerage asset catalog.
    #[must_use]
    pub fn new(entries: Vec<AssetCatalogEntry>) -> Self {
        let catalog = entries
            .into_iter()
            .map(|entry| {
                let security = SecurityId::new(&entry.ticker, entry.asset_class.security_type());
                ((entry.asset_class, entry.ticker), security)
            })
            .collect();
        Self { catalog }
    }

    /// Translate an engine security to a brokerage asset-class/ticker pair.
    pub fn to_brokerage(
        &self,
        security: &SecurityId,
    ) -> Result<(AssetClass, String), GatewayError> {
        let asset_class = match security.security_type {
            SecurityType::Equity => AssetClass::UsEquity,
            SecurityType::Crypto => AssetClass::Crypto,
            SecurityType::Forex => {
                return Err(GatewayError::UnsupportedSecurity(security.to_string()));
            }
        };
        Ok((asset_class, security.ticker.clone()))
    }

    /// Resolve a brokerage asset-class/ticker pair against the catalog.
    pub fn to_engine(
        &self,
        asset_class: AssetClass,
        ticker: &str,
    ) -> Result<SecurityId, GatewayError> {
        self.catalog
            .get(&(asset_class, ticker.to_string()))
            .cloned()
            .ok_or_else(|| GatewayError::UnknownSymbol {
                asset_class: asset_class.to_string(),
                ticker: ticker.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> SymbolMapper {
        SymbolMapper::new(vec![
            AssetCatalogEntry::new(AssetClass::UsEquity, "AAPL"),
            AssetCatalogEntry::new(AssetClass::Crypto, "BTC/USD"),
        ])
    }

    #[test]
    fn equity_maps_to_us_equity() {
        let mapper = mapper();
        let security = SecurityId::new("AAPL", SecurityType::Equity);
        let (class, ticker) = mapper.to_brokerage(&security).unwrap();
        assert_eq!(class, AssetClass::UsEquity);
        assert_eq!(ticker, "AAPL");
    }

    #[test]
    fn crypto_maps_to_crypto() {
        let mapper = mapper();
        let security = SecurityId::new("BTC/USD", SecurityType::Crypto);
        let (class, ticker) = mapper.to_brokerage(&security).unwrap();
        assert_eq!(class, AssetClass::Crypto);
        assert_eq!(ticker, "BTC/USD");
    }

    #[test]
    fn forex_is_unsupported() {
        let mapper = mapper();
        let security = SecurityId::new("EURUSD", SecurityType::Forex);
        let err = mapper.to_brokerage(&security).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedSecurity(_)));
    }

    #[test]
    fn catalog_ticker_resolves() {
        let mapper = mapper();
        let security = mapper.to_engine(AssetClass::UsEquity, "AAPL").unwrap();
        assert_eq!(security.ticker, "AAPL");
        assert_eq!(security.security_type, SecurityType::Equity);
    }

    #[test]
    fn unknown_ticker_fails() {
        let mapper = mapper();
        let err = mapper.to_engine(AssetClass::UsEquity, "ZZZZ").unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSymbol { .. }));
    }

    #[test]
    fn round_trip_through_catalog() {
        let mapper = mapper();
        let security = SecurityId::new("BTC/USD", SecurityType::Crypto);
        let (class, ticker) = mapper.to_brokerage(&security).unwrap();
        let back = mapper.to_engine(class, &ticker).unwrap();
        assert_eq!(back, security);
    }

    #[test]
    fn asset_class_wire_parse() {
        assert_eq!(AssetClass::parse("us_equity"), Some(AssetClass::UsEquity));
        assert_eq!(AssetClass::parse("crypto"), Some(AssetClass::Crypto));
        assert_eq!(AssetClass::parse("us_option"), None);
    }
}
