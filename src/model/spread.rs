use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Hold,
    Open,
    Close,
    Rebalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrageDirection {
    LongAShortB,
    LongBShortA,
}

impl ArbitrageDirection {
    /// Order side each venue leg takes to enter this direction.
    pub fn sides(self) -> (crate::model::order::Side, crate::model::order::Side) {
        use crate::model::order::Side;
        match self {
            ArbitrageDirection::LongAShortB => (Side::Buy, Side::Sell),
            ArbitrageDirection::LongBShortA => (Side::Sell, Side::Buy),
        }
    }
}

/// Rolling statistics for one symbol's cross-venue spread, computed once per
/// orchestrator iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadMetrics {
    pub symbol: String,
    pub edge_a_to_b_bps: Decimal,
    pub edge_b_to_a_bps: Decimal,
    pub signed_edge_bps: Decimal,
    pub ma: Decimal,
    pub std: Decimal,
    pub zscore: Decimal,
    pub ts_ms: i64,
}

impl SpreadMetrics {
    pub fn zeroed(symbol: impl Into<String>, ts_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            edge_a_to_b_bps: Decimal::ZERO,
            edge_b_to_a_bps: Decimal::ZERO,
            signed_edge_bps: Decimal::ZERO,
            ma: Decimal::ZERO,
            std: Decimal::ZERO,
            zscore: Decimal::ZERO,
            ts_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadSignal {
    pub action: SignalAction,
    pub direction: Option<ArbitrageDirection>,
    pub edge_bps: Decimal,
    pub zscore: Decimal,
    pub threshold_bps: Decimal,
    pub reason: String,
    pub batches: Vec<Decimal>,
    pub timestamp_ms: i64,
}

impl SpreadSignal {
    pub fn hold(reason: impl Into<String>, metrics: &SpreadMetrics, threshold_bps: Decimal) -> Self {
        Self {
            action: SignalAction::Hold,
            direction: None,
            edge_bps: metrics.signed_edge_bps,
            zscore: metrics.zscore,
            threshold_bps,
            reason: reason.into(),
            batches: Vec::new(),
            timestamp_ms: metrics.ts_ms,
        }
    }
}
