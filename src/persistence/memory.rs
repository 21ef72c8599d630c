use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::model::{EventRecord, SpreadHistoryRow, SymbolSnapshot, TradeFill};
use crate::persistence::PersistencePort;

#[derive(Default)]
struct State {
    events: Vec<EventRecord>,
    trades: Vec<TradeFill>,
    latest_snapshot: HashMap<String, SymbolSnapshot>,
    spread_history: HashMap<String, Vec<SpreadHistoryRow>>,
    spread_history_keys: HashSet<(String, i64, String)>,
}

/// In-memory implementation of [`PersistencePort`]. Authoritative for
/// nothing live (positions/health/consistency stay in memory elsewhere) —
/// this is audit trail and the scanner's spread-history seed.
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistencePort for InMemoryStore {
    async fn add_event(&self, event: EventRecord) {
        let mut state = self.state.lock();
        if let Some(existing) = state.events.iter_mut().find(|e| e.id == event.id) {
            *existing = event;
        } else {
            state.events.push(event);
        }
    }

    async fn list_events(&self, limit: usize) -> Vec<EventRecord> {
        let state = self.state.lock();
        let mut events = state.events.clone();
        events.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
        events.truncate(limit);
        events
    }

    async fn add_trade(&self, trade: TradeFill) {
        self.state.lock().trades.push(trade);
    }

    async fn add_symbol_snapshot(&self, snapshot: SymbolSnapshot) {
        self.state
            .lock()
            .latest_snapshot
            .insert(snapshot.symbol.clone(), snapshot);
    }

    async fn latest_symbol_snapshots(&self) -> Vec<SymbolSnapshot> {
        let state = self.state.lock();
        let mut rows: Vec<SymbolSnapshot> = state.latest_snapshot.values().cloned().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        rows
    }

    async fn add_spread_history_point(&self, row: SpreadHistoryRow) -> bool {
        let mut state = self.state.lock();
        let key = (row.symbol.clone(), row.ts_ms, row.source.clone());
        if !state.spread_history_keys.insert(key) {
            return false;
        }
        state.spread_history.entry(row.symbol.clone()).or_default().push(row);
        true
    }

    async fn list_recent_spread_history(&self, symbol: &str, limit: usize) -> Vec<SpreadHistoryRow> {
        let state = self.state.lock();
        match state.spread_history.get(symbol) {
            None => Vec::new(),
            Some(rows) => {
                let mut rows = rows.clone();
                rows.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
                rows.truncate(limit);
                rows
            }
        }
    }

    async fn count_spread_history(&self, symbol: &str) -> usize {
        self.state
            .lock()
            .spread_history
            .get(symbol)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    async fn trim_spread_history(&self, symbol: &str, keep: usize) {
        let mut state = self.state.lock();
        if let Some(rows) = state.spread_history.get_mut(symbol) {
            rows.sort_by(|a, b| b.ts_ms.cmp(&a.ts_ms));
            if rows.len() > keep {
                let dropped: Vec<_> = rows.split_off(keep);
                for row in dropped {
                    state
                        .spread_history_keys
                        .remove(&(row.symbol.clone(), row.ts_ms, row.source.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventLevel;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn duplicate_spread_history_points_are_ignored() {
        let store = InMemoryStore::new();
        let row = SpreadHistoryRow {
            ts_ms: 1,
            symbol: "BTC".to_string(),
            signed_edge_bps: dec!(1.0),
            tradable_edge_pct: dec!(0.1),
            source: "scanner".to_string(),
        };
        assert!(store.add_spread_history_point(row.clone()).await);
        assert!(!store.add_spread_history_point(row).await);
        assert_eq!(store.count_spread_history("BTC").await, 1);
    }

    #[tokio::test]
    async fn trim_keeps_only_the_most_recent_rows() {
        let store = InMemoryStore::new();
        for ts in 0..5 {
            store
                .add_spread_history_point(SpreadHistoryRow {
                    ts_ms: ts,
                    symbol: "BTC".to_string(),
                    signed_edge_bps: dec!(1.0),
                    tradable_edge_pct: dec!(0.1),
                    source: "scanner".to_string(),
                })
                .await;
        }
        store.trim_spread_history("BTC", 2).await;
        let rows = store.list_recent_spread_history("BTC", 10).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ts_ms, 4);
        assert_eq!(rows[1].ts_ms, 3);
    }

    #[tokio::test]
    async fn add_event_replaces_on_id() {
        let store = InMemoryStore::new();
        let event = EventRecord::new(EventLevel::Info, "test", "first", serde_json::json!({}), 0);
        let id = event.id.clone();
        store.add_event(event).await;
        let mut replacement = EventRecord::new(EventLevel::Warn, "test", "second", serde_json::json!({}), 1);
        replacement.id = id;
        store.add_event(replacement).await;
        let events = store.list_events(10).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message, "second");
    }
}
