use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::model::{Bbo, ConsistencyState};

fn diff_bps(a: Decimal, b: Decimal) -> Decimal {
    if a <= Decimal::ZERO || b <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let base = (a + b) / Decimal::TWO;
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((a - b).abs() / base) * Decimal::from(10_000)
}

/// Cross-checks WS quotes against REST quotes per symbol and strikes out
/// with hysteresis (C3).
pub struct ConsistencyGuard {
    tolerance_bps: Decimal,
    max_failures: u32,
    states: Mutex<HashMap<String, ConsistencyState>>,
}

impl ConsistencyGuard {
    pub fn new(tolerance_bps: Decimal, max_failures: u32) -> Self {
        Self {
            tolerance_bps,
            max_failures,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(
        &self,
        symbol: &str,
        a_ws: Option<Bbo>,
        a_rest: Option<Bbo>,
        b_ws: Option<Bbo>,
        b_rest: Option<Bbo>,
    ) -> bool {
        let mut states = self.states.lock();
        let state = states.entry(symbol.to_string()).or_default();

        let (a_ws, a_rest, b_ws, b_rest) = match (a_ws, a_rest, b_ws, b_rest) {
            (Some(aw), Some(ar), Some(bw), Some(br)) => (aw, ar, bw, br),
            _ => {
                state.failed_count += 1;
                state.ok = state.failed_count < self.max_failures;
                state.last_reason = "missing BBO data for comparison".to_string();
                return state.ok;
            }
        };

        let max_diff = [
            diff_bps(a_ws.bid, a_rest.bid),
            diff_bps(a_ws.ask, a_rest.ask),
            diff_bps(b_ws.bid, b_rest.bid),
            diff_bps(b_ws.ask, b_rest.ask),
        ]
        .into_iter()
        .fold(Decimal::ZERO, Decimal::max);

        if max_diff > self.tolerance_bps {
            state.failed_count += 1;
            state.ok = state.failed_count < self.max_failures;
            state.last_reason = format!("ws/rest divergence {max_diff} bps exceeds tolerance");
        } else {
            state.failed_count = 0;
            state.ok = true;
            state.last_reason.clear();
        }
        state.ok
    }

    pub fn state(&self, symbol: &str) -> Option<ConsistencyState> {
        self.states.lock().get(symbol).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, ConsistencyState> {
        self.states.lock().clone()
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
    fn missing_bbo_counts_as_failure() {
        let guard = ConsistencyGuard::new(dec!(0.08), 3);
        assert!(guard.check("BTC", None, Some(bbo(dec!(1), dec!(2))), Some(bbo(dec!(1), dec!(2))), Some(bbo(dec!(1), dec!(2)))));
        let state = guard.state("BTC").unwrap();
        assert_eq!(state.failed_count, 1);
    }

    #[test]
    fn three_consecutive_failures_trip_then_one_match_resets() {
        let guard = ConsistencyGuard::new(dec!(0.08), 3);
        let good = bbo(dec!(100.0), dec!(100.2));
        let bad = bbo(dec!(101.0), dec!(101.2));
        for _ in 0..3 {
            guard.check("BTC", Some(good), Some(bad), Some(good), Some(good));
        }
        assert!(!guard.state("BTC").unwrap().ok);

        let ok = guard.check("BTC", Some(good), Some(good), Some(good), Some(good));
        assert!(ok);
        assert_eq!(guard.state("BTC").unwrap().failed_count, 0);
    }
}
