use std::collections::HashMap;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::model::order::Side;
use crate::model::{PositionState, Venue};

/// One leg of the rebalance planner's single counter-order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebalanceOrder {
    pub venue: Venue,
    pub side: Side,
    pub quantity: Decimal,
}

/// Dual-leg position state per symbol, imbalance detection, and the
/// rebalance planner (C7).
pub struct PositionLedger {
    states: Mutex<HashMap<String, PositionState>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self, symbol: &str) -> PositionState {
        self.states.lock().entry(symbol.to_string()).or_default().clone()
    }

    pub fn set_positions(&self, symbol: &str, leg_a: Decimal, leg_b: Decimal) {
        let mut states = self.states.lock();
        let state = states.entry(symbol.to_string()).or_default();
        state.leg_a = leg_a;
        state.leg_b = leg_b;
    }

    pub fn set_target(&self, symbol: &str, target_net: Decimal) {
        self.states.lock().entry(symbol.to_string()).or_default().target_net = target_net;
    }

    pub fn apply_fill(&self, symbol: &str, venue: Venue, side: Side, quantity: Decimal) {
        let mut states = self.states.lock();
        let state = states.entry(symbol.to_string()).or_default();
        let delta = match side {
            Side::Buy => quantity,
            Side::Sell => -quantity,
        };
        match venue {
            Venue::A => state.leg_a += delta,
            Venue::B => state.leg_b += delta,
        }
    }

    pub fn can_open(&self, symbol: &str, max_position: Decimal) -> bool {
        let state = self.state(symbol);
        state.leg_a.abs() <= max_position && state.leg_b.abs() <= max_position
    }

    pub fn is_imbalanced(&self, symbol: &str, tolerance: Decimal) -> bool {
        self.state(symbol).net_exposure().abs() > tolerance
    }

    pub fn is_hard_breach(&self, symbol: &str, hard_limit: Decimal) -> bool {
        self.state(symbol).net_exposure().abs() > hard_limit
    }

    /// Produces exactly one order that shrinks `|net_exposure|` by
    /// `min(|net|, base_qty)` on the leg with the larger signed position in
    /// the overshoot direction.
    pub fn build_rebalance_orders(&self, symbol: &str, base_qty: Decimal) -> Vec<RebalanceOrder> {
        let state = self.state(symbol);
        let net = state.net_exposure();
        if net == Decimal::ZERO {
            return Vec::new();
        }
        let qty = net.abs().min(base_qty);
        let venue = if net > Decimal::ZERO {
            if state.leg_a >= state.leg_b {
                Venue::A
            } else {
                Venue::B
            }
        } else if state.leg_a <= state.leg_b {
            Venue::A
        } else {
            Venue::B
        };
        let side = if net > Decimal::ZERO { Side::Sell } else { Side::Buy };
        vec![RebalanceOrder { venue, side, quantity: qty }]
    }

    pub fn build_flatten_orders(&self, symbol: &str) -> Vec<RebalanceOrder> {
        let state = self.state(symbol);
        let mut orders = Vec::new();
        if state.leg_a != Decimal::ZERO {
            orders.push(RebalanceOrder {
                venue: Venue::A,
                side: Side::reducing(state.leg_a),
                quantity: state.leg_a.abs(),
            });
        }
        if state.leg_b != Decimal::ZERO {
            orders.push(RebalanceOrder {
                venue: Venue::B,
                side: Side::reducing(state.leg_b),
                quantity: state.leg_b.abs(),
            });
        }
        orders
    }

    pub fn snapshot(&self) -> HashMap<String, PositionState> {
        self.states.lock().clone()
    }
}

impl Default for PositionLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn apply_fill_only_touches_the_traded_leg() {
        let ledger = PositionLedger::new();
        ledger.apply_fill("BTC", Venue::A, Side::Buy, dec!(0.01));
        let state = ledger.state("BTC");
        assert_eq!(state.leg_a, dec!(0.01));
        assert_eq!(state.leg_b, Decimal::ZERO);

        ledger.apply_fill("BTC", Venue::B, Side::Sell, dec!(0.01));
        let state = ledger.state("BTC");
        assert_eq!(state.leg_a, dec!(0.01));
        assert_eq!(state.leg_b, dec!(-0.01));
    }

    #[test]
    fn buy_then_sell_same_qty_nets_to_zero() {
        let ledger = PositionLedger::new();
        ledger.apply_fill("BTC", Venue::A, Side::Buy, dec!(0.01));
        ledger.apply_fill("BTC", Venue::A, Side::Sell, dec!(0.01));
        assert_eq!(ledger.state("BTC").leg_a, Decimal::ZERO);
    }

    #[test]
    fn rebalance_planner_sells_larger_long_leg() {
        let ledger = PositionLedger::new();
        ledger.set_positions("BTC", dec!(0.01), dec!(-0.006));
        let orders = ledger.build_rebalance_orders("BTC", dec!(0.002));
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].venue, Venue::A);
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].quantity, dec!(0.002));
    }

    #[test]
    fn hard_breach_detects_and_flatten_zeroes_both_legs() {
        let ledger = PositionLedger::new();
        ledger.set_positions("BTC", dec!(0.01), Decimal::ZERO);
        assert!(ledger.is_hard_breach("BTC", dec!(0.006)));
        let orders = ledger.build_flatten_orders("BTC");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, Side::Sell);
        assert_eq!(orders[0].quantity, dec!(0.01));
    }
}
