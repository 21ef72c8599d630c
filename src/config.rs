use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::EngineError;
use crate::model::{Scope, StrategyMode, StrategyParams, SymbolConfig, Venue};

#[derive(Debug, Clone, Copy)]
pub struct BucketConfig {
    pub rate_per_sec: f64,
    pub capacity: f64,
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub stale_ms: i64,
    pub consistency_tolerance_bps: Decimal,
    pub consistency_max_failures: u32,
    pub ws_idle_timeout_sec: i64,
    pub health_fail_threshold: u32,
    pub health_cache_ms: i64,
    pub net_pos_guard_multiplier: Decimal,
    pub hard_net_limit_multiplier: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stale_ms: 1200,
            consistency_tolerance_bps: Decimal::new(8, 2),
            consistency_max_failures: 3,
            ws_idle_timeout_sec: 8,
            health_fail_threshold: 3,
            health_cache_ms: 3000,
            net_pos_guard_multiplier: Decimal::new(15, 1),
            hard_net_limit_multiplier: Decimal::new(30, 1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub simulated_market_data: bool,
    pub live_order_enabled: bool,
    pub confirm_text: String,
    pub default_mode: StrategyMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            simulated_market_data: true,
            live_order_enabled: false,
            confirm_text: "ENABLE_LIVE_ORDER".to_string(),
            default_mode: StrategyMode::Normal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub scan_interval_sec: u64,
    pub history_retention: usize,
    pub max_concurrent_fetches: usize,
    pub backfill_candle_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            scan_interval_sec: 60,
            history_retention: 2000,
            max_concurrent_fetches: 6,
            backfill_candle_limit: 720,
        }
    }
}

/// Top-level configuration, loaded once at startup from the process
/// environment. The secure, validated, hot-reloading configuration loader
/// that would sit in front of this stays outside the core.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub symbols: Vec<SymbolConfig>,
    pub strategy: StrategyParams,
    pub risk: RiskConfig,
    pub runtime: RuntimeConfig,
    pub scanner: ScannerConfig,
    pub rate_limits: HashMap<(Venue, Scope), BucketConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, EngineError> {
        dotenv::dotenv().ok();

        let symbols = parse_symbols(&env_or("ARB_SYMBOLS", "BTC-PERP"))?;

        let strategy = StrategyParams {
            ma_window: env_parse("ARB_MA_WINDOW", 120)?,
            std_window: env_parse("ARB_STD_WINDOW", 120)?,
            min_samples: env_parse("ARB_MIN_SAMPLES", 60)?,
            z_entry: env_decimal("ARB_Z_ENTRY", "1.8")?,
            z_exit: env_decimal("ARB_Z_EXIT", "0.6")?,
            z_zero_entry: env_decimal("ARB_Z_ZERO_ENTRY", "1.2")?,
            z_zero_exit: env_decimal("ARB_Z_ZERO_EXIT", "0.3")?,
            min_edge_bps: env_decimal("ARB_MIN_EDGE_BPS", "1.0")?,
            base_order_qty: env_decimal("ARB_BASE_ORDER_QTY", "0.001")?,
            max_batch_qty: env_decimal("ARB_MAX_BATCH_QTY", "0.005")?,
            max_position: env_decimal("ARB_MAX_POSITION", "0.1")?,
            loop_interval_ms: env_parse("ARB_LOOP_INTERVAL_MS", 100)?,
            position_sync_ms: env_parse("ARB_POSITION_SYNC_MS", 1500)?,
            rest_consistency_ms: env_parse("ARB_REST_CONSISTENCY_MS", 1000)?,
        };

        if strategy.ma_window == 0 || strategy.std_window == 0 {
            return Err(EngineError::Config(
                "ma_window and std_window must be positive".into(),
            ));
        }

        let risk = RiskConfig {
            stale_ms: env_parse("ARB_STALE_MS", 1200)?,
            consistency_tolerance_bps: env_decimal("ARB_CONSISTENCY_TOLERANCE_BPS", "0.08")?,
            consistency_max_failures: env_parse("ARB_CONSISTENCY_MAX_FAILURES", 3)?,
            ws_idle_timeout_sec: env_parse("ARB_WS_IDLE_TIMEOUT_SEC", 8)?,
            health_fail_threshold: env_parse("ARB_HEALTH_FAIL_THRESHOLD", 3)?,
            health_cache_ms: env_parse("ARB_HEALTH_CACHE_MS", 3000)?,
            net_pos_guard_multiplier: env_decimal("ARB_NET_POS_GUARD_MULTIPLIER", "1.5")?,
            hard_net_limit_multiplier: env_decimal("ARB_HARD_NET_LIMIT_MULTIPLIER", "3.0")?,
        };

        let simulated_market_data = env_bool("ARB_SIMULATED_MARKET_DATA", true)?;
        let live_order_enabled = env_bool("ARB_LIVE_ORDER_ENABLED", false)?;
        if simulated_market_data && live_order_enabled {
            return Err(EngineError::Config(
                "live_order_enabled cannot start true while simulated_market_data is true".into(),
            ));
        }
        let runtime = RuntimeConfig {
            simulated_market_data,
            live_order_enabled,
            confirm_text: env_or("ARB_CONFIRM_TEXT", "ENABLE_LIVE_ORDER"),
            default_mode: StrategyMode::Normal,
        };

        let scanner = ScannerConfig {
            scan_interval_sec: env_parse("ARB_SCAN_INTERVAL_SEC", 60)?,
            history_retention: env_parse("ARB_SCAN_HISTORY_RETENTION", 2000)?,
            max_concurrent_fetches: env_parse("ARB_SCAN_MAX_CONCURRENT", 6)?,
            backfill_candle_limit: env_parse("ARB_SCAN_BACKFILL_LIMIT", 720)?,
        };

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

        Ok(Self {
            symbols,
            strategy,
            risk,
            runtime,
            scanner,
            rate_limits,
        })
    }
}

fn parse_symbols(raw: &str) -> Result<Vec<SymbolConfig>, EngineError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|symbol| {
            Ok(SymbolConfig {
                symbol: symbol.to_string(),
                venue_a_market: symbol.to_string(),
                venue_b_market: symbol.to_string(),
                enabled: true,
            })
        })
        .collect()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, EngineError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => v
            .parse()
            .map_err(|_| EngineError::Config(format!("invalid value for {key}: {v}"))),
    }
}

fn env_decimal(key: &str, default: &str) -> Result<Decimal, EngineError> {
    let raw = env_or(key, default);
    raw.parse()
        .map_err(|_| EngineError::Config(format!("invalid decimal for {key}: {raw}")))
}

fn env_bool(key: &str, default: bool) -> Result<bool, EngineError> {
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(v) => match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(EngineError::Config(format!("invalid bool for {key}: {v}"))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_symbols_splits_and_trims() {
        let symbols = parse_symbols("BTC-PERP, ETH-PERP").unwrap();
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].symbol, "BTC-PERP");
        assert_eq!(symbols[1].symbol, "ETH-PERP");
    }

    #[test]
    fn env_bool_rejects_garbage() {
        std::env::set_var("ARB_TEST_BOOL_FLAG", "maybe");
        let err = env_bool("ARB_TEST_BOOL_FLAG", false).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        std::env::remove_var("ARB_TEST_BOOL_FLAG");
    }
}
