//! Operator-facing RPC surface (C9's external interface). A trait rather
//! than a transport: whatever wire protocol fronts the engine (HTTP, a
//! local socket, a CLI) adapts this, none of it lives in the core.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::model::{EventRecord, ScannerRow, StrategyMode, StrategyParams, SymbolSnapshot, WarmupStatus};
use crate::orchestrator::{Engine, StatusReport};

#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn status(&self) -> StatusReport;
    async fn symbols(&self) -> Vec<SymbolSnapshot>;
    async fn events(&self, limit: usize) -> Vec<EventRecord>;
    async fn config(&self) -> AppConfig;
    async fn market_top_spreads(&self, limit: usize, force_refresh: bool) -> Option<(Vec<ScannerRow>, WarmupStatus)>;

    async fn engine_start(&self);
    async fn engine_stop(&self);

    async fn mode_set(&self, mode: StrategyMode);
    async fn symbol_params_update(&self, params: StrategyParams);
    async fn symbol_flatten(&self, symbol: &str);

    async fn runtime_order_execution(&self, enabled: bool, confirm_text: &str) -> Result<(), EngineError>;
    async fn runtime_market_data_mode(&self, simulated: bool) -> Result<(), EngineError>;
}

#[async_trait]
impl ControlPlane for Arc<Engine> {
    async fn status(&self) -> StatusReport {
        Engine::status(self)
    }

    async fn symbols(&self) -> Vec<SymbolSnapshot> {
        Engine::symbols(self)
    }

    async fn events(&self, limit: usize) -> Vec<EventRecord> {
        Engine::events(self, limit)
    }

    async fn config(&self) -> AppConfig {
        Engine::config(self)
    }

    async fn market_top_spreads(&self, limit: usize, force_refresh: bool) -> Option<(Vec<ScannerRow>, WarmupStatus)> {
        Engine::top_spreads(self, limit, force_refresh).await
    }

    async fn engine_start(&self) {
        self.start().await;
    }

    async fn engine_stop(&self) {
        self.stop().await;
    }

    async fn mode_set(&self, mode: StrategyMode) {
        self.set_mode(mode);
    }

    async fn symbol_params_update(&self, params: StrategyParams) {
        self.update_symbol_params(params);
    }

    async fn symbol_flatten(&self, symbol: &str) {
        self.flatten_symbol(symbol).await;
    }

    async fn runtime_order_execution(&self, enabled: bool, confirm_text: &str) -> Result<(), EngineError> {
        self.set_live_order_enabled(enabled, confirm_text)
    }

    async fn runtime_market_data_mode(&self, simulated: bool) -> Result<(), EngineError> {
        self.set_simulated_market_data(simulated)
    }
}
