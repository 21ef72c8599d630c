use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;

use crate::model::{ArbitrageDirection, Bbo, SignalAction, SpreadMetrics, SpreadSignal, StrategyMode, StrategyParams};

fn to_bps(x: Decimal, base_mid: Decimal) -> Decimal {
    if base_mid <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        x / base_mid * Decimal::from(10_000)
    }
}

/// Rolling moving-average / std / z-score over the signed cross-venue edge,
/// plus the OPEN/CLOSE/HOLD signal generator (C6).
pub struct SpreadEngine {
    rings: Mutex<HashMap<String, VecDeque<Decimal>>>,
}

impl SpreadEngine {
    pub fn new() -> Self {
        Self {
            rings: Mutex::new(HashMap::new()),
        }
    }

    fn ring_capacity(params: &StrategyParams) -> usize {
        2 * params.ma_window.max(params.std_window)
    }

    pub fn compute_metrics(&self, symbol: &str, a: Bbo, b: Bbo, params: &StrategyParams, ts_ms: i64) -> SpreadMetrics {
        let edge_a_to_b = b.bid - a.ask;
        let edge_b_to_a = a.bid - b.ask;
        let base_mid = (a.mid() + b.mid()) / Decimal::TWO;

        let a_to_b_bps = to_bps(edge_a_to_b, base_mid);
        let b_to_a_bps = to_bps(edge_b_to_a, base_mid);
        let signed_edge_bps = if a_to_b_bps >= b_to_a_bps {
            a_to_b_bps
        } else {
            -b_to_a_bps
        };

        let mut rings = self.rings.lock();
        let ring = rings.entry(symbol.to_string()).or_default();
        ring.push_back(signed_edge_bps);
        let cap = Self::ring_capacity(params);
        while ring.len() > cap {
            ring.pop_front();
        }

        let (ma, std, zscore) = if ring.len() >= params.min_samples {
            let ma = mean(ring, params.ma_window);
            let std = population_stdev(ring, params.std_window);
            let z = if std > Decimal::ZERO {
                (signed_edge_bps - ma) / std
            } else {
                Decimal::ZERO
            };
            (ma, std, z)
        } else {
            (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
        };

        SpreadMetrics {
            symbol: symbol.to_string(),
            edge_a_to_b_bps: a_to_b_bps,
            edge_b_to_a_bps: b_to_a_bps,
            signed_edge_bps,
            ma,
            std,
            zscore,
            ts_ms,
        }
    }

    pub fn generate_signal(&self, metrics: &SpreadMetrics, mode: StrategyMode, params: &StrategyParams) -> SpreadSignal {
        let (z_entry, z_exit, min_edge_bps) = params.thresholds(mode);
        let direction = if metrics.signed_edge_bps >= Decimal::ZERO {
            ArbitrageDirection::LongAShortB
        } else {
            ArbitrageDirection::LongBShortA
        };
        let edge_abs = metrics.signed_edge_bps.abs();
        let z_abs = metrics.zscore.abs();

        if edge_abs < min_edge_bps {
            return SpreadSignal {
                action: SignalAction::Hold,
                direction: None,
                edge_bps: metrics.signed_edge_bps,
                zscore: metrics.zscore,
                threshold_bps: min_edge_bps,
                reason: "insufficient edge".to_string(),
                batches: Vec::new(),
                timestamp_ms: metrics.ts_ms,
            };
        }

        if z_abs >= z_entry {
            let batches = build_batches(z_abs, mode, params.base_order_qty, params.max_batch_qty);
            return SpreadSignal {
                action: SignalAction::Open,
                direction: Some(direction),
                edge_bps: metrics.signed_edge_bps,
                zscore: metrics.zscore,
                threshold_bps: z_entry,
                reason: "entry condition met".to_string(),
                batches,
                timestamp_ms: metrics.ts_ms,
            };
        }

        if z_abs <= z_exit {
            return SpreadSignal {
                action: SignalAction::Close,
                direction: Some(direction),
                edge_bps: metrics.signed_edge_bps,
                zscore: metrics.zscore,
                threshold_bps: z_exit,
                reason: "mean reversion, closing".to_string(),
                batches: vec![params.base_order_qty],
                timestamp_ms: metrics.ts_ms,
            };
        }

        SpreadSignal {
            action: SignalAction::Hold,
            direction: None,
            edge_bps: metrics.signed_edge_bps,
            zscore: metrics.zscore,
            threshold_bps: z_entry,
            reason: "awaiting better spread".to_string(),
            batches: Vec::new(),
            timestamp_ms: metrics.ts_ms,
        }
    }
}

impl Default for SpreadEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(ring: &VecDeque<Decimal>, window: usize) -> Decimal {
    let n = ring.len().min(window);
    if n == 0 {
        return Decimal::ZERO;
    }
    let sum: Decimal = ring.iter().rev().take(n).sum();
    sum / Decimal::from(n)
}

fn population_stdev(ring: &VecDeque<Decimal>, window: usize) -> Decimal {
    let n = ring.len().min(window);
    if n == 0 {
        return Decimal::ZERO;
    }
    let samples: Vec<Decimal> = ring.iter().rev().take(n).copied().collect();
    let mean_v: Decimal = samples.iter().sum::<Decimal>() / Decimal::from(n);
    let variance: Decimal =
        samples.iter().map(|x| (*x - mean_v) * (*x - mean_v)).sum::<Decimal>() / Decimal::from(n);
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

fn build_batches(z_abs: Decimal, mode: StrategyMode, base_qty: Decimal, max_batch_qty: Decimal) -> Vec<Decimal> {
    let count = if z_abs < Decimal::new(23, 1) {
        1
    } else if z_abs < Decimal::new(30, 1) {
        2
    } else {
        3
    };
    let weights: &[Decimal] = match mode {
        StrategyMode::Normal => &[Decimal::ONE, Decimal::new(7, 1), Decimal::new(5, 1)],
        StrategyMode::ZeroWear => &[Decimal::new(6, 1), Decimal::new(4, 1), Decimal::new(2, 1)],
    };
    let batches: Vec<Decimal> = weights
        .iter()
        .take(count)
        .filter(|w| **w > Decimal::ZERO)
        .map(|w| (base_qty * w).min(max_batch_qty))
        .collect();

    if batches.is_empty() {
        vec![base_qty.min(max_batch_qty)]
    } else {
        batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuoteSource;
    use rust_decimal_macros::dec;

    fn bbo(bid: Decimal, ask: Decimal) -> Bbo {
        Bbo::new(bid, ask, 0, QuoteSource::Ws)
    }

    #[test]
    fn flat_history_produces_hold_because_std_is_zero() {
        let engine = SpreadEngine::new();
        let params = StrategyParams {
            min_samples: 5,
            min_edge_bps: dec!(0.5),
            ..StrategyParams::default()
        };
        let mut metrics = SpreadMetrics::zeroed("BTC", 0);
        for _ in 0..10 {
            metrics = engine.compute_metrics("BTC", bbo(dec!(100.0), dec!(100.2)), bbo(dec!(100.01), dec!(100.21)), &params, 0);
        }
        assert_eq!(metrics.std, Decimal::ZERO);
        let signal = engine.generate_signal(&metrics, StrategyMode::Normal, &params);
        assert_eq!(signal.action, SignalAction::Hold);
    }

    #[test]
    fn below_min_samples_yields_zeroed_statistics() {
        let engine = SpreadEngine::new();
        let params = StrategyParams {
            min_samples: 60,
            ..StrategyParams::default()
        };
        let metrics = engine.compute_metrics("BTC", bbo(dec!(100.0), dec!(100.2)), bbo(dec!(100.01), dec!(100.21)), &params, 0);
        assert_eq!(metrics.ma, Decimal::ZERO);
        assert_eq!(metrics.std, Decimal::ZERO);
        assert_eq!(metrics.zscore, Decimal::ZERO);
    }

    #[test]
    fn edge_below_min_always_holds_regardless_of_zscore() {
        let engine = SpreadEngine::new();
        let params = StrategyParams {
            min_samples: 1,
            min_edge_bps: dec!(5.0),
            ..StrategyParams::default()
        };
        let metrics = engine.compute_metrics("BTC", bbo(dec!(100.00), dec!(100.20)), bbo(dec!(100.01), dec!(100.21)), &params, 0);
        let signal = engine.generate_signal(&metrics, StrategyMode::Normal, &params);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "insufficient edge");
    }

    #[test]
    fn entry_trigger_opens_with_weighted_batches() {
        let engine = SpreadEngine::new();
        let params = StrategyParams {
            min_samples: 5,
            z_entry: dec!(1.8),
            min_edge_bps: dec!(1.0),
            base_order_qty: dec!(0.001),
            max_batch_qty: dec!(0.005),
            ..StrategyParams::default()
        };
        for _ in 0..10 {
            engine.compute_metrics("BTC", bbo(dec!(100.0), dec!(100.2)), bbo(dec!(100.2), dec!(100.4)), &params, 0);
        }
        let metrics = engine.compute_metrics("BTC", bbo(dec!(100.0), dec!(100.2)), bbo(dec!(101.0), dec!(101.2)), &params, 0);
        let signal = engine.generate_signal(&metrics, StrategyMode::Normal, &params);
        assert_eq!(signal.action, SignalAction::Open);
        assert!(!signal.batches.is_empty());
    }

    #[test]
    fn build_batches_falls_back_when_all_weights_zero() {
        let batches = build_batches(dec!(1.0), StrategyMode::Normal, dec!(0.001), dec!(0.005));
        assert_eq!(batches, vec![dec!(0.001)]);
    }
}
