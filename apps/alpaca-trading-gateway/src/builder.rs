//! Order request construction and its inverse.
//!
//! Maps an engine order into the brokerage submission/replacement payloads,
//! and reconstructs engine orders from brokerage snapshots for the
//! open-orders query.

use std::sync::Arc;

use crate::alpaca::api_types::{AlpacaOrder, OrderPlacement, OrderReplacement, parse_decimal};
use crate::engine::{Order, OrderId, OrderKind, OrderSide, SecurityType, TimeInForce};
use crate::error::GatewayError;
use crate::symbols::{AssetClass, SymbolMapper};

/// Builds brokerage order payloads from engine orders.
#[derive(Debug, Clone)]
pub struct OrderRequestBuilder {
    mapper: Arc<SymbolMapper>,
}

impl OrderRequestBuilder {
    /// Create a builder over the given symbol mapper.
    #[must_use]
    pub const fn new(mapper: Arc<SymbolMapper>) -> Self {
        Self { mapper }
    }

    /// Build a submission payload for an engine order.
    ///
    /// Fails with `UnsupportedSecurity` when the security cannot be mapped
    /// and `UnsupportedOrderType` for kinds with no brokerage equivalent.
    pub fn build(&self, order: &Order) -> Result<OrderPlacement, GatewayError> {
        let (_, ticker) = self.mapper.to_brokerage(&order.security)?;

        let (order_type, limit_price, stop_price, trail_percent, trail_price) = match order.kind {
            OrderKind::Market => ("market", None, None, None, None),
            OrderKind::Limit { limit_price } => {
                ("limit", Some(limit_price.to_string()), None, None, None)
            }
            OrderKind::StopMarket { stop_price } => {
                ("stop", None, Some(stop_price.to_string()), None, None)
            }
            OrderKind::StopLimit {
                stop_price,
                limit_price,
            } => (
                "stop_limit",
                Some(limit_price.to_string()),
                Some(stop_price.to_string()),
                None,
                None,
            ),
            OrderKind::TrailingStop {
                trail_percent,
                trail_price,
            } => match (trail_percent, trail_price) {
                (Some(percent), None) => {
                    ("trailing_stop", None, None, Some(percent.to_string()), None)
                }
                (None, Some(price)) => ("trailing_stop", None, None, None, Some(price.to_string())),
                _ => {
                    return Err(GatewayError::UnsupportedOrderType(
                        "trailing stop requires exactly one of trail_percent or trail_price"
                            .to_string(),
                    ));
                }
            },
        };

        Ok(OrderPlacement {
            symbol: ticker,
            qty: order.quantity.to_string(),
            side: side_str(order.side).to_string(),
            order_type: order_type.to_string(),
            time_in_force: map_time_in_force(order.time_in_force, order.security.security_type)
                .to_string(),
            limit_price,
            stop_price,
            trail_percent,
            trail_price,
            client_order_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Build a replacement payload carrying quantity plus whichever of the
    /// limit/stop prices the order kind defines.
    pub fn build_replace(&self, order: &Order) -> Result<OrderReplacement, GatewayError> {
        if matches!(order.kind, OrderKind::TrailingStop { .. }) {
            // The replace endpoint cannot change trailing offsets.
            return Err(GatewayError::UnsupportedOrderType(
                "trailing stop orders cannot be replaced".to_string(),
            ));
        }

        Ok(OrderReplacement {
            qty: order.quantity.to_string(),
            limit_price: order.kind.limit_price().map(|p| p.to_string()),
            stop_price: order.kind.stop_price().map(|p| p.to_string()),
        })
    }

    /// Reconstruct an engine order from a brokerage order snapshot.
    ///
    /// Inverse of `build`, used by the open-orders query. The engine order id
    /// is taken from the client order id assigned at submission.
    pub fn reconstruct(&self, brokerage: &AlpacaOrder) -> Result<Order, GatewayError> {
        let asset_class = AssetClass::parse(&brokerage.asset_class).ok_or_else(|| {
            GatewayError::UnknownSymbol {
                asset_class: brokerage.asset_class.clone(),
                ticker: brokerage.symbol.clone(),
            }
        })?;
        let security = self.mapper.to_engine(asset_class, &brokerage.symbol)?;

        let kind = match brokerage.order_type.as_str() {
            "market" => OrderKind::Market,
            "limit" => OrderKind::Limit {
                limit_price: parse_decimal(brokerage.limit_price.as_deref().unwrap_or_default()),
            },
            "stop" => OrderKind::StopMarket {
                stop_price: parse_decimal(brokerage.stop_price.as_deref().unwrap_or_default()),
            },
            "stop_limit" => OrderKind::StopLimit {
                stop_price: parse_decimal(brokerage.stop_price.as_deref().unwrap_or_default()),
                limit_price: parse_decimal(brokerage.limit_price.as_deref().unwrap_or_default()),
            },
            "trailing_stop" => OrderKind::TrailingStop {
                trail_percent: brokerage.trail_percent.as_deref().map(parse_decimal),
                trail_price: brokerage.trail_price.as_deref().map(parse_decimal),
            },
            other => {
                return Err(GatewayError::UnsupportedOrderType(other.to_string()));
            }
        };

        let side = if brokerage.side == "sell" {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };

        let mut order = Order::new(
            OrderId::new(&brokerage.client_order_id),
            security,
            side,
            parse_decimal(&brokerage.qty),
            kind,
            parse_time_in_force(&brokerage.time_in_force),
        );
        order.status = crate::alpaca::api_types::parse_order_status(&brokerage.status);
        order.broker_ids.push(brokerage.id.clone());
        Ok(order)
    }
}

const fn side_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

/// Map the engine time-in-force for the security's trading venue.
///
/// Crypto trades around the clock and has no `day` session, so Day maps to
/// GTC there.
const fn map_time_in_force(tif: TimeInForce, security_type: SecurityType) -> &'static str {
    match (tif, security_type) {
        (TimeInForce::Day, SecurityType::Crypto) | (TimeInForce::GoodTilCanceled, _) => "gtc",
        (TimeInForce::Day, _) => "day",
        (TimeInForce::ImmediateOrCancel, _) => "ioc",
        (TimeInForce::FillOrKill, _) => "fok",
    }
}

fn parse_time_in_force(tif: &str) -> TimeInForce {
    match tif {
        "gtc" => TimeInForce::GoodTilCanceled,
        "ioc" => TimeInForce::ImmediateOrCancel,
        "fok" => TimeInForce::FillOrKill,
        _ => TimeInForce::Day,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SecurityId;
    use crate::symbols::AssetCatalogEntry;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn builder() -> OrderRequestBuilder {
        OrderRequestBuilder::new(Arc::new(SymbolMapper::new(vec![
            AssetCatalogEntry::new(AssetClass::UsEquity, "AAPL"),
            AssetCatalogEntry::new(AssetClass::Crypto, "BTC/USD"),
        ])))
    }

    fn aapl_order(kind: OrderKind) -> Order {
        Order::new(
            OrderId::new("o-1"),
            SecurityId::new("AAPL", SecurityType::Equity),
            OrderSide::Buy,
            dec!(10),
            kind,
            TimeInForce::Day,
        )
    }

    #[test_case(OrderKind::Market, "market" ; "market order")]
    #[test_case(OrderKind::Limit { limit_price: dec!(150) }, "limit" ; "limit order")]
    #[test_case(OrderKind::StopMarket { stop_price: dec!(140) }, "stop" ; "stop order")]
    #[test_case(
        OrderKind::StopLimit { stop_price: dec!(140), limit_price: dec!(139) },
        "stop_limit" ; "stop limit order"
    )]
    fn build_selects_order_type(kind: OrderKind, expected: &str) {
        let placement = builder().build(&aapl_order(kind)).unwrap();
        assert_eq!(placement.order_type, expected);
        assert_eq!(placement.qty, "10");
        assert_eq!(placement.side, "buy");
    }

    #[test]
    fn trailing_stop_percent() {
        let placement = builder()
            .build(&aapl_order(OrderKind::TrailingStop {
                trail_percent: Some(dec!(2.5)),
                trail_price: None,
            }))
            .unwrap();
        assert_eq!(placement.order_type, "trailing_stop");
        assert_eq!(placement.trail_percent.as_deref(), Some("2.5"));
        assert!(placement.trail_price.is_none());
    }

    #[test]
    fn trailing_stop_dollars() {
        let placement = builder()
            .build(&aapl_order(OrderKind::TrailingStop {
                trail_percent: None,
                trail_price: Some(dec!(3)),
            }))
            .unwrap();
        assert_eq!(placement.trail_price.as_deref(), Some("3"));
        assert!(placement.trail_percent.is_none());
    }

    #[test]
    fn trailing_stop_with_both_offsets_is_unsupported() {
        let err = builder()
            .build(&aapl_order(OrderKind::TrailingStop {
                trail_percent: Some(dec!(2.5)),
                trail_price: Some(dec!(3)),
            }))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedOrderType(_)));
    }

    #[test]
    fn trailing_stop_with_neither_offset_is_unsupported() {
        let err = builder()
            .build(&aapl_order(OrderKind::TrailingStop {
                trail_percent: None,
                trail_price: None,
            }))
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedOrderType(_)));
    }

    #[test]
    fn day_maps_to_gtc_for_crypto() {
        let order = Order::market(
            OrderId::new("o-1"),
            SecurityId::new("BTC/USD", SecurityType::Crypto),
            OrderSide::Buy,
            dec!(1),
        );
        let placement = builder().build(&order).unwrap();
        assert_eq!(placement.time_in_force, "gtc");
    }

    #[test]
    fn forex_security_is_rejected_before_any_mapping() {
        let order = Order::market(
            OrderId::new("o-1"),
            SecurityId::new("EURUSD", SecurityType::Forex),
            OrderSide::Buy,
            dec!(1000),
        );
        let err = builder().build(&order).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedSecurity(_)));
    }

    #[test]
    fn replace_carries_kind_specific_prices() {
        let order = aapl_order(OrderKind::StopLimit {
            stop_price: dec!(140),
            limit_price: dec!(139),
        });
        let replacement = builder().build_replace(&order).unwrap();
        assert_eq!(replacement.qty, "10");
        assert_eq!(replacement.limit_price.as_deref(), Some("139"));
        assert_eq!(replacement.stop_price.as_deref(), Some("140"));
    }

    #[test]
    fn replace_omits_undefined_prices() {
        let replacement = builder().build_replace(&aapl_order(OrderKind::Market)).unwrap();
        assert!(replacement.limit_price.is_none());
        assert!(replacement.stop_price.is_none());
    }

    fn snapshot(order_type: &str) -> AlpacaOrder {
        AlpacaOrder {
            id: "broker-1".to_string(),
            client_order_id: "o-1".to_string(),
            symbol: "AAPL".to_string(),
            asset_class: "us_equity".to_string(),
            qty: "10".to_string(),
            filled_qty: "0".to_string(),
            filled_avg_price: None,
            status: "new".to_string(),
            side: "sell".to_string(),
            order_type: order_type.to_string(),
            time_in_force: "day".to_string(),
            limit_price: Some("150".to_string()),
            stop_price: Some("140".to_string()),
            trail_percent: None,
            trail_price: None,
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn reconstruct_round_trips_quantity_side_and_prices() {
        let builder = builder();
        let order = builder.reconstruct(&snapshot("stop_limit")).unwrap();

        assert_eq!(order.quantity, dec!(10));
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(
            order.kind,
            OrderKind::StopLimit {
                stop_price: dec!(140),
                limit_price: dec!(150),
            }
        );
        assert_eq!(order.broker_ids, vec!["broker-1".to_string()]);

        // Building the reconstructed order reproduces the original payload fields.
        let placement = builder.build(&order).unwrap();
        assert_eq!(placement.qty, "10");
        assert_eq!(placement.side, "sell");
        assert_eq!(placement.order_type, "stop_limit");
        assert_eq!(placement.limit_price.as_deref(), Some("150"));
        assert_eq!(placement.stop_price.as_deref(), Some("140"));
    }

    #[test]
    fn reconstruct_rejects_unknown_order_type() {
        let err = builder().reconstruct(&snapshot("bracket")).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedOrderType(_)));
    }

    #[test]
    fn reconstruct_rejects_unknown_asset_class() {
        let mut snap = snapshot("market");
        snap.asset_class = "us_option".to_string();
        let err = builder().reconstruct(&snap).unwrap_err();
        assert!(matches!(err, GatewayError::UnknownSymbol { .. }));
    }
}
