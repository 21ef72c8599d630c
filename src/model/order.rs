use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::venue::Venue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side a leg must trade to reduce toward zero, given its current signed
    /// quantity (positive = long, negative = short).
    pub fn reducing(leg_qty: Decimal) -> Side {
        if leg_qty > Decimal::ZERO {
            Side::Sell
        } else {
            Side::Buy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    PostOnlyLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub venue: Venue,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub reduce_only: bool,
    pub post_only: bool,
    pub tag: String,
}

impl OrderRequest {
    pub fn reduce_only_market(venue: Venue, symbol: impl Into<String>, side: Side, quantity: Decimal, tag: impl Into<String>) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
            side,
            quantity,
            order_type: OrderType::Market,
            price: None,
            reduce_only: true,
            post_only: false,
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub success: bool,
    pub venue: Venue,
    pub order_id: String,
    pub side: Side,
    pub requested_quantity: Decimal,
    pub filled_quantity: Decimal,
    pub avg_price: Decimal,
    pub message: String,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeFill {
    pub venue: Venue,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    pub order_id: String,
    pub tag: String,
    pub timestamp_ms: i64,
}

/// Outcome of submitting one [`crate::model::spread::SpreadSignal`] (or a
/// rebalance/flatten order list) to the execution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub attempted_orders: u32,
    pub success_orders: u32,
    pub failed_orders: u32,
    pub message: String,
    pub order_ids: Vec<String>,
    pub timestamp_ms: i64,
}

impl ExecutionReport {
    pub fn no_attempt(message: impl Into<String>, timestamp_ms: i64) -> Self {
        Self {
            attempted_orders: 0,
            success_orders: 0,
            failed_orders: 0,
            message: message.into(),
            order_ids: Vec::new(),
            timestamp_ms,
        }
    }
}
