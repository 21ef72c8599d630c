use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::model::spread::{SignalAction, SpreadSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

/// The risk gate state that fed a given tick's signal decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub stale: bool,
    pub consistency_ok: bool,
    pub health_ok: bool,
    pub ws_ok: bool,
    pub can_open: bool,
    pub reason: String,
}

impl RiskState {
    pub fn classify(&self) -> RiskBucket {
        if !self.ws_ok || !self.health_ok {
            RiskBucket::Critical
        } else if !self.consistency_ok || self.stale {
            RiskBucket::Warning
        } else {
            RiskBucket::Normal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBucket {
    Normal,
    Warning,
    Critical,
}

/// Read-model snapshot for one symbol, rebuilt every orchestrator tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub status: EngineStatus,
    pub signal: Option<SpreadSignal>,
    pub venue_a_bid: Decimal,
    pub venue_a_ask: Decimal,
    pub venue_a_mid: Decimal,
    pub venue_b_bid: Decimal,
    pub venue_b_ask: Decimal,
    pub venue_b_mid: Decimal,
    pub spread_bps: Decimal,
    pub spread_price: Decimal,
    pub zscore: Decimal,
    pub net_position: Decimal,
    pub target_position: Decimal,
    pub venue_a_position: Decimal,
    pub venue_b_position: Decimal,
    pub updated_at_ms: i64,
    pub risk: RiskState,
}

impl SymbolSnapshot {
    pub fn last_action(&self) -> SignalAction {
        self.signal
            .as_ref()
            .map(|s| s.action)
            .unwrap_or(SignalAction::Hold)
    }
}
