use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::spread::ArbitrageDirection;

/// Dual-leg position state for one symbol, owned exclusively by the
/// orchestrator and mutated only through [`crate::position_ledger::PositionLedger`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    pub leg_a: Decimal,
    pub leg_b: Decimal,
    pub target_net: Decimal,
    pub active_direction: Option<ArbitrageDirection>,
}

impl PositionState {
    pub fn new() -> Self {
        Self {
            leg_a: Decimal::ZERO,
            leg_b: Decimal::ZERO,
            target_net: Decimal::ZERO,
            active_direction: None,
        }
    }

    pub fn net_exposure(&self) -> Decimal {
        self.leg_a + self.leg_b
    }
}

impl Default for PositionState {
    fn default() -> Self {
        Self::new()
    }
}
