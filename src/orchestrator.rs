//! Per-symbol scheduling loop, engine lifecycle, runtime toggles and the
//! aggregate read-model (C9).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex as SyncMutex, RwLock as SyncRwLock};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::EngineError;
use crate::execution::{ExecutionEngine, VenueAdapter};
use crate::model::{
    EngineStatus, EventLevel, EventRecord, RiskBucket, RiskState, ScannerRow, SpreadMetrics,
    SpreadSignal, StrategyMode, StrategyParams, SymbolConfig, SymbolSnapshot, Venue,
};
use crate::persistence::PersistencePort;
use crate::position_ledger::PositionLedger;
use crate::risk::{ConsistencyGuard, HealthGuard, OrderBookCache, RateLimiter, WsSupervisor};
use crate::scanner::UniverseScanner;
use crate::spread_engine::SpreadEngine;

const EVENT_RING_CAPACITY: usize = 500;
const EVENT_CHANNEL_CAPACITY: usize = 200;
const SNAPSHOT_CHANNEL_CAPACITY: usize = 200;
const MARKET_TOP_CHANNEL_CAPACITY: usize = 1;

/// Holds the active strategy mode; separated out because the Python
/// original keeps it as its own small collaborator rather than folding it
/// into the orchestrator's general state.
pub struct ModeController {
    mode: SyncRwLock<StrategyMode>,
}

impl ModeController {
    pub fn new(initial: StrategyMode) -> Self {
        Self {
            mode: SyncRwLock::new(initial),
        }
    }

    pub fn get(&self) -> StrategyMode {
        *self.mode.read()
    }

    pub fn set(&self, mode: StrategyMode) {
        *self.mode.write() = mode;
    }
}

/// Aggregate counts behind `status()`, bucketed by each symbol's current
/// risk classification.
#[derive(Debug, Clone, Default)]
pub struct RiskCounts {
    pub normal: usize,
    pub warning: usize,
    pub critical: usize,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub engine_status: EngineStatus,
    pub mode: StrategyMode,
    pub simulated_market_data: bool,
    pub live_order_enabled: bool,
    pub risk_counts: RiskCounts,
}

struct SymbolCadence {
    last_rest_ms: i64,
    last_position_sync_ms: i64,
}

impl SymbolCadence {
    fn new() -> Self {
        Self {
            last_rest_ms: 0,
            last_position_sync_ms: 0,
        }
    }
}

/// Owns every component and runs one scheduling task per enabled symbol
/// (C9). No component holds a back-pointer to the engine; callbacks are
/// plain closures registered at construction.
pub struct Engine {
    config: SyncRwLock<AppConfig>,
    adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    order_book_cache: Arc<OrderBookCache>,
    consistency_guard: Arc<ConsistencyGuard>,
    health_guard: Arc<HealthGuard>,
    ws_supervisor: Arc<WsSupervisor>,
    rate_limiter: Arc<RateLimiter>,
    spread_engine: Arc<SpreadEngine>,
    position_ledger: Arc<PositionLedger>,
    execution_engine: Arc<ExecutionEngine>,
    persistence: Arc<dyn PersistencePort>,
    scanner: Option<Arc<UniverseScanner>>,
    mode: ModeController,
    status: SyncRwLock<EngineStatus>,
    simulated_market_data: AtomicBool,
    events: SyncMutex<VecDeque<EventRecord>>,
    event_tx: broadcast::Sender<EventRecord>,
    snapshot_tx: broadcast::Sender<SymbolSnapshot>,
    market_top_tx: broadcast::Sender<Vec<ScannerRow>>,
    snapshots: SyncRwLock<HashMap<String, SymbolSnapshot>>,
    shutdown: Arc<AtomicBool>,
    tasks: SyncMutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        config: AppConfig,
        adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
        persistence: Arc<dyn PersistencePort>,
        scanner: Option<Arc<UniverseScanner>>,
    ) -> Arc<Self> {
        let mut rate_limiter = RateLimiter::new();
        for (&(venue, scope), bucket) in &config.rate_limits {
            rate_limiter
                .register(venue, scope, bucket.rate_per_sec, bucket.capacity)
                .expect("rate limit buckets from config are always positive");
        }
        let rate_limiter = Arc::new(rate_limiter);
        let position_ledger = Arc::new(PositionLedger::new());
        let execution_engine = Arc::new(ExecutionEngine::new(
            adapters.clone(),
            rate_limiter.clone(),
            position_ledger.clone(),
            config.runtime.live_order_enabled,
            None,
        ));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let (market_top_tx, _) = broadcast::channel(MARKET_TOP_CHANNEL_CAPACITY);
        let default_mode = config.runtime.default_mode;
        let simulated_market_data = config.runtime.simulated_market_data;

        Arc::new(Self {
            order_book_cache: Arc::new(OrderBookCache::new()),
            consistency_guard: Arc::new(ConsistencyGuard::new(
                config.risk.consistency_tolerance_bps,
                config.risk.consistency_max_failures,
            )),
            health_guard: Arc::new(HealthGuard::new(
                config.risk.health_fail_threshold,
                config.risk.health_cache_ms,
            )),
            ws_supervisor: Arc::new(WsSupervisor::new(config.risk.ws_idle_timeout_sec)),
            rate_limiter,
            spread_engine: Arc::new(SpreadEngine::new()),
            position_ledger,
            execution_engine,
            persistence,
            scanner,
            mode: ModeController::new(default_mode),
            status: SyncRwLock::new(EngineStatus::Stopped),
            simulated_market_data: AtomicBool::new(simulated_market_data),
            events: SyncMutex::new(VecDeque::with_capacity(EVENT_RING_CAPACITY)),
            event_tx,
            snapshot_tx,
            market_top_tx,
            snapshots: SyncRwLock::new(HashMap::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            tasks: SyncMutex::new(Vec::new()),
            adapters,
            config: SyncRwLock::new(config),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EventRecord> {
        self.event_tx.subscribe()
    }

    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<SymbolSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn subscribe_market_top(&self) -> broadcast::Receiver<Vec<ScannerRow>> {
        self.market_top_tx.subscribe()
    }

    fn emit_event(&self, level: EventLevel, source: &str, message: impl Into<String>, data: serde_json::Value) {
        let now_ms = now_ms();
        let message = message.into();
        match level {
            EventLevel::Info => info!(source, %message, "engine event"),
            EventLevel::Warn => warn!(source, %message, "engine event"),
            EventLevel::Error => error!(source, %message, "engine event"),
        }
        let event = EventRecord::new(level, source, message, data, now_ms);
        {
            let mut ring = self.events.lock();
            ring.push_back(event.clone());
            while ring.len() > EVENT_RING_CAPACITY {
                ring.pop_front();
            }
        }
        let persistence = self.persistence.clone();
        let for_store = event.clone();
        tokio::spawn(async move { persistence.add_event(for_store).await });
        let _ = self.event_tx.send(event);
    }

    /// Starts one task per enabled symbol. No-op if already running.
    pub async fn start(self: &Arc<Self>) {
        if *self.status.read() == EngineStatus::Running {
            return;
        }
        *self.status.write() = EngineStatus::Starting;
        self.shutdown.store(false, Ordering::SeqCst);
        for adapter in self.adapters.values() {
            let symbols: Vec<String> = self
                .config
                .read()
                .symbols
                .iter()
                .map(|s| s.symbol.clone())
                .collect();
            if let Err(err) = adapter.connect(&symbols).await {
                self.emit_event(EventLevel::Error, "engine", format!("adapter connect failed: {err}"), serde_json::json!({}));
            }
        }
        let symbols: Vec<SymbolConfig> = self
            .config
            .read()
            .symbols
            .iter()
            .filter(|s| s.enabled)
            .cloned()
            .collect();
        let mut handles = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let engine = self.clone();
            handles.push(tokio::spawn(async move { engine.run_symbol_loop(symbol).await }));
        }
        *self.tasks.lock() = handles;
        *self.status.write() = EngineStatus::Running;
    }

    /// Cancels all per-symbol tasks, awaits them, then disconnects
    /// adapters. Idempotent.
    pub async fn stop(self: &Arc<Self>) {
        if *self.status.read() == EngineStatus::Stopped {
            return;
        }
        *self.status.write() = EngineStatus::Stopping;
        self.shutdown.store(true, Ordering::SeqCst);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for handle in handles {
            let _ = handle.await;
        }
        for adapter in self.adapters.values() {
            let _ = adapter.disconnect().await;
        }
        *self.status.write() = EngineStatus::Stopped;
    }

    /// Stops the engine, then nothing further — the in-memory persistence
    /// port needs no close hook.
    pub async fn shutdown(self: &Arc<Self>) {
        self.stop().await;
    }

    async fn run_symbol_loop(self: Arc<Self>, symbol: SymbolConfig) {
        let mut cadence = SymbolCadence::new();
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let tick_start = std::time::Instant::now();
            if let Err(err) = self.run_symbol_iteration(&symbol, &mut cadence).await {
                self.emit_event(
                    EventLevel::Error,
                    &symbol.symbol,
                    format!("iteration failed: {err}"),
                    serde_json::json!({}),
                );
            }
            let interval_ms = self.config.read().strategy.loop_interval_ms;
            let elapsed_ms = tick_start.elapsed().as_millis() as u64;
            let sleep_ms = interval_ms.saturating_sub(elapsed_ms).max(10);
            tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        }
    }

    async fn run_symbol_iteration(
        &self,
        symbol: &SymbolConfig,
        cadence: &mut SymbolCadence,
    ) -> anyhow::Result<()> {
        let now_ms = now_ms();
        let (strategy, risk) = {
            let config = self.config.read();
            (config.strategy.clone(), config.risk.clone())
        };

        // Step 1: WS pull.
        for venue in [Venue::A, Venue::B] {
            match self.adapters[&venue].fetch_bbo(&symbol.symbol).await {
                Ok(Some(bbo)) => {
                    self.ws_supervisor.mark_message(venue, now_ms);
                    self.order_book_cache.update_ws(&symbol.symbol, venue, bbo);
                }
                Ok(None) => {}
                Err(err) => {
                    self.emit_event(
                        EventLevel::Warn,
                        &symbol.symbol,
                        format!("transient venue error on {venue}: {err}"),
                        serde_json::json!({"venue": venue.as_str()}),
                    );
                }
            }
        }

        // Step 2: REST pull + consistency check on cadence.
        if now_ms - cadence.last_rest_ms >= strategy.rest_consistency_ms as i64 {
            cadence.last_rest_ms = now_ms;
            for venue in [Venue::A, Venue::B] {
                if let Ok(Some(bbo)) = self.adapters[&venue].fetch_rest_bbo(&symbol.symbol).await {
                    self.order_book_cache.update_rest(&symbol.symbol, venue, bbo);
                }
            }
            let ok = self.consistency_guard.check(
                &symbol.symbol,
                self.order_book_cache.ws(&symbol.symbol, Venue::A),
                self.order_book_cache.rest(&symbol.symbol, Venue::A),
                self.order_book_cache.ws(&symbol.symbol, Venue::B),
                self.order_book_cache.rest(&symbol.symbol, Venue::B),
            );
            if !ok {
                self.emit_event(
                    EventLevel::Warn,
                    &symbol.symbol,
                    "consistency check failed",
                    serde_json::json!({}),
                );
            }
        }

        // Step 3: health checks on cadence.
        for venue in [Venue::A, Venue::B] {
            if self.health_guard.should_check(venue, now_ms) {
                let ok = self.adapters[&venue].health_check().await.unwrap_or(false);
                self.health_guard.update(venue, ok, if ok { "" } else { "health check failed" }, now_ms);
            }
        }

        // Step 4: position sync on cadence.
        if now_ms - cadence.last_position_sync_ms >= strategy.position_sync_ms as i64 {
            cadence.last_position_sync_ms = now_ms;
            let leg_a = self.adapters[&Venue::A].fetch_position(&symbol.symbol).await.unwrap_or(Decimal::ZERO);
            let leg_b = self.adapters[&Venue::B].fetch_position(&symbol.symbol).await.unwrap_or(Decimal::ZERO);
            self.position_ledger.set_positions(&symbol.symbol, leg_a, leg_b);
        }

        // Step 5: gates.
        let stale = self.order_book_cache.is_stale(&symbol.symbol, now_ms, risk.stale_ms);
        let ws_ok = self.ws_supervisor.is_ok(now_ms);
        let consistency_ok = self
            .consistency_guard
            .state(&symbol.symbol)
            .map(|s| s.ok)
            .unwrap_or(true);
        let health_ok = self.health_guard.can_open();
        let can_open = !stale && ws_ok && consistency_ok && health_ok;
        let risk_state = RiskState {
            stale,
            consistency_ok,
            health_ok,
            ws_ok,
            can_open,
            reason: gate_reason(stale, ws_ok, consistency_ok, health_ok),
        };

        // Step 6: hard breach flatten.
        let max_position = strategy.max_position;
        let hard_limit = max_position * risk.hard_net_limit_multiplier;
        if self.position_ledger.is_hard_breach(&symbol.symbol, hard_limit) {
            self.emit_event(
                EventLevel::Warn,
                &symbol.symbol,
                "hard net exposure limit breached, flattening",
                serde_json::json!({}),
            );
            self.execution_engine.flatten_symbol(&symbol.symbol, now_ms).await;
        }

        // Step 7: metrics + signal.
        let pair = self.order_book_cache.effective_pair(&symbol.symbol);
        let (metrics, signal) = match pair {
            Some((a, b)) => {
                let metrics = self.spread_engine.compute_metrics(&symbol.symbol, a, b, &strategy, now_ms);
                let signal = self.spread_engine.generate_signal(&metrics, self.mode.get(), &strategy);
                (Some(metrics), signal)
            }
            None => {
                let zeroed = SpreadMetrics::zeroed(&symbol.symbol, now_ms);
                let signal = SpreadSignal::hold("missing quotes", &zeroed, strategy.min_edge_bps);
                (None, signal)
            }
        };

        // Step 8: imbalance rebalance.
        let net_guard = max_position * risk.net_pos_guard_multiplier;
        if self.position_ledger.is_imbalanced(&symbol.symbol, net_guard) {
            let orders = self.position_ledger.build_rebalance_orders(&symbol.symbol, strategy.base_order_qty);
            if !orders.is_empty() {
                self.execution_engine.execute_rebalance(&symbol.symbol, &orders, now_ms).await;
            }
        }

        // Step 9: execute signal.
        let (b_bid, b_ask) = pair.map(|(_, b)| (b.bid, b.ask)).unwrap_or((Decimal::ZERO, Decimal::ZERO));
        self.execution_engine
            .execute_signal(&symbol.symbol, &signal, b_bid, b_ask, can_open, max_position, now_ms)
            .await;

        // Step 10: snapshot emit.
        let state = self.position_ledger.state(&symbol.symbol);
        let (a_bid, a_ask, a_mid, b_bid_full, b_ask_full, b_mid) = match pair {
            Some((a, b)) => (a.bid, a.ask, a.mid(), b.bid, b.ask, b.mid()),
            None => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        };
        let snapshot = SymbolSnapshot {
            symbol: symbol.symbol.clone(),
            status: *self.status.read(),
            signal: Some(signal),
            venue_a_bid: a_bid,
            venue_a_ask: a_ask,
            venue_a_mid: a_mid,
            venue_b_bid: b_bid_full,
            venue_b_ask: b_ask_full,
            venue_b_mid: b_mid,
            spread_bps: metrics.as_ref().map(|m| m.signed_edge_bps).unwrap_or(Decimal::ZERO),
            spread_price: b_bid_full - a_ask,
            zscore: metrics.as_ref().map(|m| m.zscore).unwrap_or(Decimal::ZERO),
            net_position: state.net_exposure(),
            target_position: state.target_net,
            venue_a_position: state.leg_a,
            venue_b_position: state.leg_b,
            updated_at_ms: now_ms,
            risk: risk_state,
        };
        self.snapshots.write().insert(symbol.symbol.clone(), snapshot.clone());
        let _ = self.snapshot_tx.send(snapshot);

        Ok(())
    }

    // -- runtime toggle guard rails --

    pub fn set_live_order_enabled(&self, enabled: bool, confirm_text: &str) -> Result<(), EngineError> {
        if enabled {
            if self.simulated_market_data.load(Ordering::SeqCst) {
                return Err(EngineError::Config(
                    "cannot enable live orders while simulated market data is on".into(),
                ));
            }
            if confirm_text != self.config.read().runtime.confirm_text {
                return Err(EngineError::Config("confirmation phrase does not match".into()));
            }
        }
        self.execution_engine.set_live_order_enabled(enabled);
        Ok(())
    }

    pub fn set_simulated_market_data(&self, simulated: bool) -> Result<(), EngineError> {
        if *self.status.read() != EngineStatus::Stopped {
            return Err(EngineError::Config(
                "cannot switch market-data mode while the engine is running".into(),
            ));
        }
        if simulated && self.execution_engine.live_order_enabled() {
            self.execution_engine.set_live_order_enabled(false);
            self.emit_event(
                EventLevel::Warn,
                "engine",
                "live orders force-disabled: simulated market data re-enabled",
                serde_json::json!({}),
            );
        }
        self.simulated_market_data.store(simulated, Ordering::SeqCst);
        Ok(())
    }

    pub fn set_mode(&self, mode: StrategyMode) {
        self.mode.set(mode);
    }

    pub fn update_symbol_params(&self, params: StrategyParams) {
        self.config.write().strategy = params;
    }

    pub async fn flatten_symbol(&self, symbol: &str) {
        self.execution_engine.flatten_symbol(symbol, now_ms()).await;
    }

    // -- read model --

    pub fn status(&self) -> StatusReport {
        let mut counts = RiskCounts::default();
        for snapshot in self.snapshots.read().values() {
            match snapshot.risk.classify() {
                RiskBucket::Normal => counts.normal += 1,
                RiskBucket::Warning => counts.warning += 1,
                RiskBucket::Critical => counts.critical += 1,
            }
        }
        StatusReport {
            engine_status: *self.status.read(),
            mode: self.mode.get(),
            simulated_market_data: self.simulated_market_data.load(Ordering::SeqCst),
            live_order_enabled: self.execution_engine.live_order_enabled(),
            risk_counts: counts,
        }
    }

    pub fn symbols(&self) -> Vec<SymbolSnapshot> {
        let mut rows: Vec<SymbolSnapshot> = self.snapshots.read().values().cloned().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        rows
    }

    pub fn events(&self, limit: usize) -> Vec<EventRecord> {
        let ring = self.events.lock();
        ring.iter().rev().take(limit).cloned().collect()
    }

    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    pub async fn rate_limit_snapshot(&self) -> HashMap<(Venue, crate::model::Scope), crate::risk::BucketStats> {
        self.rate_limiter.snapshot().await
    }

    pub async fn top_spreads(&self, limit: usize, force_refresh: bool) -> Option<(Vec<ScannerRow>, crate::model::WarmupStatus)> {
        let scanner = self.scanner.as_ref()?;
        let result = scanner.top_spreads(limit, force_refresh).await;
        let _ = self.market_top_tx.send(result.0.clone());
        Some(result)
    }
}

fn gate_reason(stale: bool, ws_ok: bool, consistency_ok: bool, health_ok: bool) -> String {
    if !ws_ok {
        "websocket not ok".to_string()
    } else if !health_ok {
        "health check failing".to_string()
    } else if stale {
        "quotes stale".to_string()
    } else if !consistency_ok {
        "consistency check failing".to_string()
    } else {
        "ok".to_string()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::SimulatedAdapter;
    use crate::persistence::InMemoryStore;
    use rust_decimal_macros::dec;

    fn test_config() -> AppConfig {
        use crate::config::{BucketConfig, RiskConfig, RuntimeConfig, ScannerConfig};
        use crate::model::Scope;

        let mut rate_limits = HashMap::new();
        for venue in [Venue::A, Venue::B] {
            rate_limits.insert(
                (venue, Scope::MarketData),
                BucketConfig {
                    rate_per_sec: 15.0,
                    capacity: 25.0,
                },
            );
            rate_limits.insert(
                (venue, Scope::Order),
                BucketConfig {
                    rate_per_sec: 8.0,
                    capacity: 12.0,
                },
            );
        }
        AppConfig {
            symbols: vec![SymbolConfig {
                symbol: "BTC".to_string(),
                venue_a_market: "BTC".to_string(),
                venue_b_market: "BTC".to_string(),
                enabled: true,
            }],
            strategy: StrategyParams::default(),
            risk: RiskConfig::default(),
            runtime: RuntimeConfig::default(),
            scanner: ScannerConfig::default(),
            rate_limits,
        }
    }

    fn engine_with_simulated_adapters() -> Arc<Engine> {
        let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        let a = Arc::new(SimulatedAdapter::new("a", dec!(0.05)));
        let b = Arc::new(SimulatedAdapter::new("b", dec!(0.05)));
        a.set_mid("BTC", dec!(100.0));
        b.set_mid("BTC", dec!(100.1));
        adapters.insert(Venue::A, a);
        adapters.insert(Venue::B, b);
        Engine::new(test_config(), adapters, Arc::new(InMemoryStore::new()), None)
    }

    #[test]
    fn live_orders_rejected_while_simulated_market_data_is_on() {
        let engine = engine_with_simulated_adapters();
        let err = engine.set_live_order_enabled(true, "ENABLE_LIVE_ORDER").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn wrong_confirmation_phrase_is_rejected() {
        let engine = engine_with_simulated_adapters();
        engine.set_simulated_market_data(false).unwrap();
        let err = engine.set_live_order_enabled(true, "nope").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[tokio::test]
    async fn re_enabling_simulated_mode_force_disables_live_orders() {
        let engine = engine_with_simulated_adapters();
        engine.set_simulated_market_data(false).unwrap();
        engine.set_live_order_enabled(true, "ENABLE_LIVE_ORDER").unwrap();
        assert!(engine.execution_engine.live_order_enabled());

        engine.set_simulated_market_data(true).unwrap();
        assert!(!engine.execution_engine.live_order_enabled());
    }

    #[tokio::test]
    async fn single_iteration_produces_a_symbol_snapshot() {
        let engine = engine_with_simulated_adapters();
        let symbol = SymbolConfig {
            symbol: "BTC".to_string(),
            venue_a_market: "BTC".to_string(),
            venue_b_market: "BTC".to_string(),
            enabled: true,
        };
        let mut cadence = SymbolCadence::new();
        engine.run_symbol_iteration(&symbol, &mut cadence).await.unwrap();
        let snapshots = engine.symbols();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].symbol, "BTC");
    }
}
