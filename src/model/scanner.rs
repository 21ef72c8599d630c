use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One persisted spread-history observation. `(symbol, ts, source)` is
/// unique in the persistence port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpreadHistoryRow {
    pub ts_ms: i64,
    pub symbol: String,
    pub signed_edge_bps: Decimal,
    pub tradable_edge_pct: Decimal,
    pub source: String,
}

/// One ranked row of the universe scanner's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerRow {
    pub symbol: String,
    pub effective_leverage: Decimal,
    pub tradable_edge_price: Decimal,
    pub tradable_edge_bps: Decimal,
    pub signed_edge_bps: Decimal,
    pub net_nominal_spread: Decimal,
    pub gross_nominal_spread: Decimal,
    pub zscore: Decimal,
    pub spread_speed_pct_per_min: Decimal,
    pub volatility: Decimal,
    pub direction: crate::model::spread::ArbitrageDirection,
    pub ts_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupStatus {
    pub done: bool,
    pub required_samples: usize,
    pub symbols_total: usize,
    pub symbols_ready: usize,
    pub symbols_pending: usize,
    pub sample_counts: HashMap<String, usize>,
    pub last_error: Option<String>,
}
