//! Universe scanner: cross-venue pair enumeration, fee- and
//! leverage-adjusted tradable edge, warm-up gating, and spread-history
//! persistence (C10).

pub mod fees;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::model::{ArbitrageDirection, Bbo, ScannerRow, SpreadHistoryRow, Venue, WarmupStatus};
use crate::persistence::PersistencePort;
use crate::scanner::fees::{effective_leverage, total_fee_rate, FeeProfile};

/// One aligned close price, used for candle backfill.
#[derive(Debug, Clone, Copy)]
pub struct Candle {
    pub ts_ms: i64,
    pub close: Decimal,
}

/// Market-data surface the scanner needs beyond the trading-loop adapter
/// port: symbol discovery, leverage limits, depth snapshots, fee schedules,
/// and candle history for backfill.
#[async_trait]
pub trait ScannerMarketSource: Send + Sync {
    async fn list_common_symbols(&self) -> Result<Vec<String>>;
    async fn quote_asset(&self, venue: Venue, symbol: &str) -> Result<Option<String>>;
    async fn max_leverage(&self, venue: Venue, symbol: &str) -> Result<Option<Decimal>>;
    async fn fetch_top_of_book(&self, venue: Venue, symbol: &str, depth: u32) -> Result<Option<Bbo>>;
    async fn fee_profile(&self, venue: Venue, symbol: &str) -> Result<Option<FeeProfile>>;
    async fn fetch_candles(&self, venue: Venue, symbol: &str, limit: usize) -> Result<Vec<Candle>>;
}

#[derive(Debug)]
enum RejectReason {
    QuoteAssetUnsupported,
    LeverageMissing,
    LeverageBelow50x,
    OrderbookError(Venue),
    InvalidQuotes,
    EdgeNotPositive,
    NetSpreadNotPositive,
}

impl RejectReason {
    fn as_str(&self) -> &'static str {
        match self {
            RejectReason::QuoteAssetUnsupported => "quote_asset_unsupported",
            RejectReason::LeverageMissing => "leverage_missing",
            RejectReason::LeverageBelow50x => "effective_leverage_below_50x",
            RejectReason::OrderbookError(Venue::A) => "venue_a_orderbook_error",
            RejectReason::OrderbookError(Venue::B) => "venue_b_orderbook_error",
            RejectReason::InvalidQuotes => "invalid_quotes",
            RejectReason::EdgeNotPositive => "edge_not_positive",
            RejectReason::NetSpreadNotPositive => "net_spread_not_positive",
        }
    }
}

const ACCEPTED_QUOTE_ASSETS: &[&str] = &["USDT", "USDC", "USD"];
const SPEED_WINDOW_SEC: i64 = 600;

struct SpeedSample {
    ts_ms: i64,
    tradable_edge_pct: Decimal,
}

#[derive(Default)]
struct Cache {
    rows: Vec<ScannerRow>,
    last_refreshed: Option<Instant>,
    last_error: Option<String>,
}

pub struct UniverseScanner {
    source: Arc<dyn ScannerMarketSource>,
    persistence: Arc<dyn PersistencePort>,
    scan_interval: Duration,
    history_retention: usize,
    max_concurrent_fetches: usize,
    backfill_candle_limit: usize,
    min_samples: usize,
    cache: RwLock<Cache>,
    refresh_lock: Mutex<()>,
    sample_counts: Mutex<HashMap<String, usize>>,
    speed_rings: Mutex<HashMap<String, VecDeque<SpeedSample>>>,
    appends_since_trim: Mutex<HashMap<String, u32>>,
    seeded: Mutex<HashSet<String>>,
}

impl UniverseScanner {
    pub fn new(
        source: Arc<dyn ScannerMarketSource>,
        persistence: Arc<dyn PersistencePort>,
        scan_interval: Duration,
        history_retention: usize,
        max_concurrent_fetches: usize,
        backfill_candle_limit: usize,
        min_samples: usize,
    ) -> Self {
        Self {
            source,
            persistence,
            scan_interval,
            history_retention,
            max_concurrent_fetches,
            backfill_candle_limit,
            min_samples,
            cache: RwLock::new(Cache::default()),
            refresh_lock: Mutex::new(()),
            sample_counts: Mutex::new(HashMap::new()),
            speed_rings: Mutex::new(HashMap::new()),
            appends_since_trim: Mutex::new(HashMap::new()),
            seeded: Mutex::new(HashSet::new()),
        }
    }

    /// Rebuilds `sample_counts` and `speed_rings` for `symbol` from C11 the
    /// first time this symbol is touched after construction, so warm-up
    /// state and spread speed survive a process restart. A no-op on every
    /// call after the first for a given symbol.
    async fn ensure_seeded(&self, symbol: &str) {
        {
            let mut seeded = self.seeded.lock().await;
            if !seeded.insert(symbol.to_string()) {
                return;
            }
        }

        let count = self.persistence.count_spread_history(symbol).await;
        if count > 0 {
            self.sample_counts.lock().await.insert(symbol.to_string(), count);
        }

        let mut rows = self
            .persistence
            .list_recent_spread_history(symbol, self.history_retention)
            .await;
        rows.sort_by(|a, b| a.ts_ms.cmp(&b.ts_ms));
        let Some(&latest_ts) = rows.last().map(|r| &r.ts_ms) else {
            return;
        };
        let ring: VecDeque<SpeedSample> = rows
            .into_iter()
            .filter(|row| latest_ts - row.ts_ms <= SPEED_WINDOW_SEC * 1000)
            .map(|row| SpeedSample {
                ts_ms: row.ts_ms,
                tradable_edge_pct: row.tradable_edge_pct,
            })
            .collect();
        if !ring.is_empty() {
            self.speed_rings.lock().await.insert(symbol.to_string(), ring);
        }
    }

    pub async fn top_spreads(&self, limit: usize, force_refresh: bool) -> (Vec<ScannerRow>, WarmupStatus) {
        self.ensure_cache(force_refresh).await;
        let cache = self.cache.read().await;
        let mut rows = cache.rows.clone();
        rows.sort_by(|a, b| {
            b.spread_speed_pct_per_min
                .abs()
                .cmp(&a.spread_speed_pct_per_min.abs())
                .then(b.zscore.abs().cmp(&a.zscore.abs()))
                .then(b.gross_nominal_spread.cmp(&a.gross_nominal_spread))
        });
        rows.truncate(limit);
        (rows, self.warmup_status(cache.last_error.clone()).await)
    }

    async fn ensure_cache(&self, force: bool) {
        if !force {
            let cache = self.cache.read().await;
            if let Some(last) = cache.last_refreshed {
                if last.elapsed() < self.scan_interval {
                    return;
                }
            }
        }
        let _guard = self.refresh_lock.lock().await;
        let fresh_enough = {
            let cache = self.cache.read().await;
            !force
                && cache
                    .last_refreshed
                    .is_some_and(|last| last.elapsed() < self.scan_interval)
        };
        if fresh_enough {
            return;
        }
        self.refresh_once().await;
    }

    async fn refresh_once(&self) {
        match self.scan_all_symbols().await {
            Ok(rows) => {
                let mut cache = self.cache.write().await;
                cache.rows = rows;
                cache.last_refreshed = Some(Instant::now());
                cache.last_error = None;
            }
            Err(err) => {
                let mut cache = self.cache.write().await;
                cache.last_error = Some(err.to_string());
            }
        }
    }

    /// Fetches every common symbol's pair row, at most
    /// `max_concurrent_fetches` in flight at a time.
    async fn scan_all_symbols(&self) -> Result<Vec<ScannerRow>> {
        let symbols = self.source.list_common_symbols().await?;
        let mut rows = Vec::with_capacity(symbols.len());
        for chunk in symbols.chunks(self.max_concurrent_fetches.max(1)) {
            let fetches = chunk.iter().map(|symbol| self.fetch_pair_row(symbol));
            rows.extend(futures_util::future::join_all(fetches).await.into_iter().flatten());
        }
        Ok(rows)
    }

    async fn fetch_pair_row(&self, symbol: &str) -> Option<ScannerRow> {
        match self.try_fetch_pair_row(symbol).await {
            Ok(row) => row,
            Err(reason) => {
                tracing::debug!(symbol, reason = reason.as_str(), "scanner rejected symbol");
                None
            }
        }
    }

    async fn try_fetch_pair_row(&self, symbol: &str) -> Result<Option<ScannerRow>, RejectReason> {
        self.ensure_seeded(symbol).await;

        let quote_a = self
            .source
            .quote_asset(Venue::A, symbol)
            .await
            .ok()
            .flatten();
        let quote_b = self
            .source
            .quote_asset(Venue::B, symbol)
            .await
            .ok()
            .flatten();
        if !accepted_quote(quote_a.as_deref()) || !accepted_quote(quote_b.as_deref()) {
            return Err(RejectReason::QuoteAssetUnsupported);
        }

        let lev_a = self.source.max_leverage(Venue::A, symbol).await.ok().flatten();
        let lev_b = self.source.max_leverage(Venue::B, symbol).await.ok().flatten();
        let (lev_a, lev_b) = match (lev_a, lev_b) {
            (Some(a), Some(b)) if a > Decimal::ZERO && b > Decimal::ZERO => (a, b),
            _ => return Err(RejectReason::LeverageMissing),
        };
        let eff_lev = effective_leverage(lev_a, lev_b);
        if eff_lev < Decimal::from(50) {
            return Err(RejectReason::LeverageBelow50x);
        }

        let a_book = self
            .source
            .fetch_top_of_book(Venue::A, symbol, 5)
            .await
            .map_err(|_| RejectReason::OrderbookError(Venue::A))?
            .ok_or(RejectReason::OrderbookError(Venue::A))?;
        let b_book = self
            .source
            .fetch_top_of_book(Venue::B, symbol, 10)
            .await
            .map_err(|_| RejectReason::OrderbookError(Venue::B))?
            .ok_or(RejectReason::OrderbookError(Venue::B))?;
        if !a_book.valid() || !b_book.valid() {
            return Err(RejectReason::InvalidQuotes);
        }

        let a_mid = a_book.mid();
        let b_mid = b_book.mid();
        let reference_mid = (a_mid + b_mid) / Decimal::TWO;
        let to_bps = |x: Decimal| {
            if reference_mid <= Decimal::ZERO {
                Decimal::ZERO
            } else {
                x / reference_mid * Decimal::from(10_000)
            }
        };
        let edge_a_to_b_bps = to_bps(b_book.bid - a_book.ask);
        let edge_b_to_a_bps = to_bps(a_book.bid - b_book.ask);
        let signed_edge_bps = if edge_a_to_b_bps >= edge_b_to_a_bps {
            edge_a_to_b_bps
        } else {
            -edge_b_to_a_bps
        };

        let edge_sell_a_buy_b = a_book.bid - b_book.bid;
        let edge_buy_a_sell_b = b_book.ask - a_book.ask;
        let (tradable_edge_price, direction) = if edge_sell_a_buy_b >= edge_buy_a_sell_b {
            (edge_sell_a_buy_b, ArbitrageDirection::LongBShortA)
        } else {
            (edge_buy_a_sell_b, ArbitrageDirection::LongAShortB)
        };
        if tradable_edge_price <= Decimal::ZERO {
            return Err(RejectReason::EdgeNotPositive);
        }

        let tradable_edge_bps = to_bps(tradable_edge_price);
        let gross_nominal_spread = tradable_edge_price * eff_lev;
        let fee_a = self.source.fee_profile(Venue::A, symbol).await.ok().flatten();
        let fee_b = self.source.fee_profile(Venue::B, symbol).await.ok().flatten();
        let fee_rate = total_fee_rate(fee_a, fee_b);
        let fee_cost = reference_mid * eff_lev * fee_rate;
        let net_nominal_spread = gross_nominal_spread - fee_cost;
        if net_nominal_spread <= Decimal::ZERO {
            return Err(RejectReason::NetSpreadNotPositive);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let tradable_edge_pct = if reference_mid > Decimal::ZERO {
            tradable_edge_price / reference_mid
        } else {
            Decimal::ZERO
        };

        self.record_sample(symbol, now_ms, signed_edge_bps, tradable_edge_pct)
            .await;
        self.backfill_if_needed(symbol).await;

        let (speed, volatility) = self.speed_and_volatility(symbol).await;

        Ok(Some(ScannerRow {
            symbol: symbol.to_string(),
            effective_leverage: eff_lev,
            tradable_edge_price,
            tradable_edge_bps,
            signed_edge_bps,
            net_nominal_spread,
            gross_nominal_spread,
            zscore: Decimal::ZERO,
            spread_speed_pct_per_min: speed,
            volatility,
            direction,
            ts_ms: now_ms,
        }))
    }

    async fn record_sample(&self, symbol: &str, ts_ms: i64, signed_edge_bps: Decimal, tradable_edge_pct: Decimal) {
        *self.sample_counts.lock().await.entry(symbol.to_string()).or_insert(0) += 1;

        let row = SpreadHistoryRow {
            ts_ms,
            symbol: symbol.to_string(),
            signed_edge_bps,
            tradable_edge_pct,
            source: "scanner".to_string(),
        };
        if self.persistence.add_spread_history_point(row).await {
            let mut counts = self.appends_since_trim.lock().await;
            let count = counts.entry(symbol.to_string()).or_insert(0);
            *count += 1;
            if *count >= 20 {
                *count = 0;
                self.persistence
                    .trim_spread_history(symbol, self.history_retention)
                    .await;
            }
        }

        let mut rings = self.speed_rings.lock().await;
        let ring = rings.entry(symbol.to_string()).or_default();
        ring.push_back(SpeedSample {
            ts_ms,
            tradable_edge_pct,
        });
        while let Some(front) = ring.front() {
            if ts_ms - front.ts_ms > SPEED_WINDOW_SEC * 1000 {
                ring.pop_front();
            } else {
                break;
            }
        }
    }

    async fn speed_and_volatility(&self, symbol: &str) -> (Decimal, Decimal) {
        let rings = self.speed_rings.lock().await;
        let Some(ring) = rings.get(symbol) else {
            return (Decimal::ZERO, Decimal::ZERO);
        };
        if ring.len() < 2 {
            return (Decimal::ZERO, Decimal::ZERO);
        }
        let first = ring.front().unwrap();
        let last = ring.back().unwrap();
        let elapsed_sec = Decimal::from((last.ts_ms - first.ts_ms).max(1)) / Decimal::from(1000);
        let speed = (last.tradable_edge_pct - first.tradable_edge_pct) / elapsed_sec * Decimal::from(60);

        let n = Decimal::from(ring.len());
        let mean: Decimal = ring.iter().map(|s| s.tradable_edge_pct).sum::<Decimal>() / n;
        let variance: Decimal = ring
            .iter()
            .map(|s| (s.tradable_edge_pct - mean) * (s.tradable_edge_pct - mean))
            .sum::<Decimal>()
            / n;
        let volatility = rust_decimal::MathematicalOps::sqrt(&variance).unwrap_or(Decimal::ZERO);
        (speed, volatility)
    }

    async fn backfill_if_needed(&self, symbol: &str) {
        let have = self.persistence.count_spread_history(symbol).await;
        if have >= self.min_samples {
            return;
        }
        let limit = self.backfill_candle_limit;
        let a_candles = match self.source.fetch_candles(Venue::A, symbol, limit).await {
            Ok(c) => c,
            Err(_) => return,
        };
        let b_candles = match self.source.fetch_candles(Venue::B, symbol, limit).await {
            Ok(c) => c,
            Err(_) => return,
        };
        let b_by_ts: HashMap<i64, Decimal> = b_candles.into_iter().map(|c| (c.ts_ms, c.close)).collect();
        for a in a_candles {
            let Some(b_close) = b_by_ts.get(&a.ts_ms) else {
                continue;
            };
            let base_mid = (a.close + *b_close) / Decimal::TWO;
            if base_mid <= Decimal::ZERO {
                continue;
            }
            let signed_edge_bps = (a.close - *b_close) / base_mid * Decimal::from(10_000);
            let row = SpreadHistoryRow {
                ts_ms: a.ts_ms,
                symbol: symbol.to_string(),
                signed_edge_bps,
                tradable_edge_pct: (a.close - *b_close).abs() / base_mid,
                source: "ohlcv_backfill".to_string(),
            };
            self.persistence.add_spread_history_point(row).await;
        }
    }

    async fn warmup_status(&self, last_error: Option<String>) -> WarmupStatus {
        let counts = self.sample_counts.lock().await;
        let symbols_total = counts.len();
        let symbols_ready = counts.values().filter(|&&c| c >= self.min_samples).count();
        WarmupStatus {
            done: last_error.is_none() && symbols_total > 0 && symbols_ready == symbols_total,
            required_samples: self.min_samples,
            symbols_total,
            symbols_ready,
            symbols_pending: symbols_total - symbols_ready,
            sample_counts: counts.clone(),
            last_error,
        }
    }

    /// Repeatedly forces a refresh until warm-up is done or `timeout` has
    /// elapsed, sleeping `poll` between attempts.
    pub async fn warmup_until_ready(&self, timeout: Duration, poll: Duration) -> WarmupStatus {
        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_cache(true).await;
            let cache = self.cache.read().await;
            let status = self.warmup_status(cache.last_error.clone()).await;
            if status.done || Instant::now() >= deadline {
                return status;
            }
            drop(cache);
            tokio::time::sleep(poll).await;
        }
    }
}

fn accepted_quote(asset: Option<&str>) -> bool {
    asset.is_some_and(|a| ACCEPTED_QUOTE_ASSETS.contains(&a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Mutex as StdMutex;

    struct FixedSource {
        leverages: StdMutex<HashMap<(Venue, String), Decimal>>,
        books: StdMutex<HashMap<(Venue, String), Bbo>>,
        symbols: Vec<String>,
    }

    #[async_trait]
    impl ScannerMarketSource for FixedSource {
        async fn list_common_symbols(&self) -> Result<Vec<String>> {
            Ok(self.symbols.clone())
        }
        async fn quote_asset(&self, _venue: Venue, _symbol: &str) -> Result<Option<String>> {
            Ok(Some("USDT".to_string()))
        }
        async fn max_leverage(&self, venue: Venue, symbol: &str) -> Result<Option<Decimal>> {
            Ok(self.leverages.lock().unwrap().get(&(venue, symbol.to_string())).copied())
        }
        async fn fetch_top_of_book(&self, venue: Venue, symbol: &str, _depth: u32) -> Result<Option<Bbo>> {
            Ok(self.books.lock().unwrap().get(&(venue, symbol.to_string())).copied())
        }
        async fn fee_profile(&self, _venue: Venue, _symbol: &str) -> Result<Option<FeeProfile>> {
            Ok(None)
        }
        async fn fetch_candles(&self, _venue: Venue, _symbol: &str, _limit: usize) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    fn bbo(bid: Decimal, ask: Decimal) -> Bbo {
        Bbo::new(bid, ask, 0, crate::model::QuoteSource::Ws)
    }

    #[tokio::test]
    async fn low_leverage_pair_is_rejected() {
        let mut leverages = HashMap::new();
        leverages.insert((Venue::A, "BTC".to_string()), dec!(20));
        leverages.insert((Venue::B, "BTC".to_string()), dec!(50));
        let source = Arc::new(FixedSource {
            leverages: StdMutex::new(leverages),
            books: StdMutex::new(HashMap::new()),
            symbols: vec!["BTC".to_string()],
        });
        let scanner = UniverseScanner::new(
            source,
            Arc::new(InMemoryStore::new()),
            Duration::from_secs(60),
            2000,
            4,
            720,
            10,
        );
        let row = scanner.try_fetch_pair_row("BTC").await;
        assert!(matches!(row, Err(RejectReason::LeverageBelow50x)));
    }

    #[tokio::test]
    async fn sufficient_leverage_and_positive_net_spread_produces_a_row() {
        let mut leverages = HashMap::new();
        leverages.insert((Venue::A, "BTC".to_string()), dec!(50));
        leverages.insert((Venue::B, "BTC".to_string()), dec!(100));
        let mut books = HashMap::new();
        books.insert((Venue::A, "BTC".to_string()), bbo(dec!(100.0), dec!(100.1)));
        books.insert((Venue::B, "BTC".to_string()), bbo(dec!(100.5), dec!(100.6)));
        let source = Arc::new(FixedSource {
            leverages: StdMutex::new(leverages),
            books: StdMutex::new(books),
            symbols: vec!["BTC".to_string()],
        });
        let scanner = UniverseScanner::new(
            source,
            Arc::new(InMemoryStore::new()),
            Duration::from_secs(60),
            2000,
            4,
            720,
            10,
        );
        let row = scanner.try_fetch_pair_row("BTC").await.unwrap().unwrap();
        assert!(row.net_nominal_spread > Decimal::ZERO);
        assert!(row.effective_leverage >= dec!(50));
        assert!(row.tradable_edge_price > Decimal::ZERO);
    }

    #[tokio::test]
    async fn first_access_after_restart_seeds_counts_and_ring_from_persistence() {
        let store = Arc::new(InMemoryStore::new());
        for ts in [0i64, 60_000, 120_000] {
            store
                .add_spread_history_point(SpreadHistoryRow {
                    ts_ms: ts,
                    symbol: "BTC".to_string(),
                    signed_edge_bps: dec!(1.0),
                    tradable_edge_pct: dec!(0.001),
                    source: "scanner".to_string(),
                })
                .await;
        }
        let source = Arc::new(FixedSource {
            leverages: StdMutex::new(HashMap::new()),
            books: StdMutex::new(HashMap::new()),
            symbols: vec!["BTC".to_string()],
        });
        let scanner = UniverseScanner::new(source, store, Duration::from_secs(60), 2000, 4, 720, 10);

        // No leverage configured, so this rejects the pair — but seeding
        // runs before that check, on every symbol touched.
        let _ = scanner.try_fetch_pair_row("BTC").await;

        let status = scanner.warmup_status(None).await;
        assert_eq!(status.sample_counts.get("BTC"), Some(&3));
        assert_eq!(scanner.speed_rings.lock().await.get("BTC").unwrap().len(), 3);

        // Re-fetching the same symbol must not double-seed on top of the
        // live samples recorded since.
        let count_before = *status.sample_counts.get("BTC").unwrap();
        scanner.ensure_seeded("BTC").await;
        assert_eq!(
            scanner.sample_counts.lock().await.get("BTC").copied(),
            Some(count_before)
        );
    }
}
