use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::model::{Bbo, OrderAck, OrderRequest, QuoteSource};

/// Abstract contract every venue connector satisfies, real or simulated
/// (C12). A simulated variant must be interchangeable with a live one.
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    async fn connect(&self, symbols: &[String]) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn health_check(&self) -> Result<bool>;
    async fn fetch_bbo(&self, symbol: &str) -> Result<Option<Bbo>>;
    async fn fetch_rest_bbo(&self, symbol: &str) -> Result<Option<Bbo>>;
    async fn fetch_position(&self, symbol: &str) -> Result<Decimal>;
    async fn fetch_balance_summary(&self) -> Result<Decimal>;
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck>;
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<bool>;
}

/// Synthesizes BBOs and fills locally instead of talking to a real venue.
/// Used both for standalone testing and for the `simulated_market_data`
/// runtime mode.
pub struct SimulatedAdapter {
    name: String,
    mid_prices: Mutex<HashMap<String, Decimal>>,
    half_spread: Decimal,
    positions: Mutex<HashMap<String, Decimal>>,
    order_seq: AtomicU64,
}

impl SimulatedAdapter {
    pub fn new(name: impl Into<String>, half_spread: Decimal) -> Self {
        Self {
            name: name.into(),
            mid_prices: Mutex::new(HashMap::new()),
            half_spread,
            positions: Mutex::new(HashMap::new()),
            order_seq: AtomicU64::new(0),
        }
    }

    pub fn set_mid(&self, symbol: &str, mid: Decimal) {
        self.mid_prices.lock().insert(symbol.to_string(), mid);
    }

    fn quote(&self, symbol: &str) -> Option<Bbo> {
        let mid = *self.mid_prices.lock().get(symbol)?;
        Some(Bbo::new(
            mid - self.half_spread,
            mid + self.half_spread,
            now_ms(),
            QuoteSource::Ws,
        ))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[async_trait]
impl VenueAdapter for SimulatedAdapter {
    async fn connect(&self, _symbols: &[String]) -> Result<()> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn fetch_bbo(&self, symbol: &str) -> Result<Option<Bbo>> {
        Ok(self.quote(symbol))
    }

    async fn fetch_rest_bbo(&self, symbol: &str) -> Result<Option<Bbo>> {
        Ok(self.quote(symbol).map(|b| Bbo {
            source: QuoteSource::Rest,
            ..b
        }))
    }

    async fn fetch_position(&self, symbol: &str) -> Result<Decimal> {
        Ok(*self.positions.lock().get(symbol).unwrap_or(&Decimal::ZERO))
    }

    async fn fetch_balance_summary(&self) -> Result<Decimal> {
        Ok(Decimal::ZERO)
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck> {
        let quote = self.quote(&request.symbol);
        let fill_price = request
            .price
            .or_else(|| {
                quote.map(|q| match request.side {
                    crate::model::Side::Buy => q.ask,
                    crate::model::Side::Sell => q.bid,
                })
            })
            .unwrap_or(Decimal::ZERO);

        let delta = match request.side {
            crate::model::Side::Buy => request.quantity,
            crate::model::Side::Sell => -request.quantity,
        };
        *self
            .positions
            .lock()
            .entry(request.symbol.clone())
            .or_insert(Decimal::ZERO) += delta;

        let id = self.order_seq.fetch_add(1, Ordering::Relaxed);
        Ok(OrderAck {
            success: true,
            venue: request.venue,
            order_id: format!("{}-{id}", self.name),
            side: request.side,
            requested_quantity: request.quantity,
            filled_quantity: request.quantity,
            avg_price: fill_price,
            message: String::new(),
            timestamp_ms: now_ms(),
        })
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: &str) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderType, Side, Venue};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn place_order_fills_fully_and_updates_position() {
        let adapter = SimulatedAdapter::new("sim-a", dec!(0.1));
        adapter.set_mid("BTC", dec!(100.0));
        let ack = adapter
            .place_order(OrderRequest {
                venue: Venue::A,
                symbol: "BTC".to_string(),
                side: Side::Buy,
                quantity: dec!(0.01),
                order_type: OrderType::Market,
                price: None,
                reduce_only: false,
                post_only: false,
                tag: "open".to_string(),
            })
            .await
            .unwrap();
        assert!(ack.success);
        assert_eq!(ack.filled_quantity, dec!(0.01));
        assert_eq!(adapter.fetch_position("BTC").await.unwrap(), dec!(0.01));
    }
}
