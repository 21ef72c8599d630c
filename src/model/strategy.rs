use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Selects which entry/exit thresholds the spread engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyMode {
    Normal,
    ZeroWear,
}

/// Strategy parameters, tunable at runtime via `symbol.params.update`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    pub ma_window: usize,
    pub std_window: usize,
    pub min_samples: usize,
    pub z_entry: Decimal,
    pub z_exit: Decimal,
    pub z_zero_entry: Decimal,
    pub z_zero_exit: Decimal,
    pub min_edge_bps: Decimal,
    pub base_order_qty: Decimal,
    pub max_batch_qty: Decimal,
    pub max_position: Decimal,
    pub loop_interval_ms: u64,
    pub position_sync_ms: u64,
    pub rest_consistency_ms: u64,
}

impl StrategyParams {
    /// Entry/exit/deadband thresholds the spread engine should use for the
    /// given mode.
    pub fn thresholds(&self, mode: StrategyMode) -> (Decimal, Decimal, Decimal) {
        match mode {
            StrategyMode::Normal => (self.z_entry, self.z_exit, self.min_edge_bps),
            StrategyMode::ZeroWear => (
                self.z_zero_entry,
                self.z_zero_exit,
                self.min_edge_bps * Decimal::new(7, 1),
            ),
        }
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            ma_window: 120,
            std_window: 120,
            min_samples: 60,
            z_entry: Decimal::new(18, 1),
            z_exit: Decimal::new(6, 1),
            z_zero_entry: Decimal::new(12, 1),
            z_zero_exit: Decimal::new(3, 1),
            min_edge_bps: Decimal::ONE,
            base_order_qty: Decimal::new(1, 3),
            max_batch_qty: Decimal::new(5, 3),
            max_position: Decimal::new(1, 1),
            loop_interval_ms: 100,
            position_sync_ms: 1500,
            rest_consistency_ms: 1000,
        }
    }
}
