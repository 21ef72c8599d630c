//! Append-only audit ports (C11): events, trades, per-symbol snapshots, and
//! the spread-history series the scanner and spread engine seed from. These
//! are abstract — the durable SQLite/CSV-backed implementation is an
//! external collaborator; [`memory::InMemoryStore`] is the in-process
//! default used to run and test the core.

pub mod memory;

use async_trait::async_trait;

use crate::model::{EventRecord, SpreadHistoryRow, SymbolSnapshot, TradeFill};

#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn add_event(&self, event: EventRecord);
    async fn list_events(&self, limit: usize) -> Vec<EventRecord>;

    async fn add_trade(&self, trade: TradeFill);

    async fn add_symbol_snapshot(&self, snapshot: SymbolSnapshot);
    async fn latest_symbol_snapshots(&self) -> Vec<SymbolSnapshot>;

    /// Returns `false` when the `(symbol, ts, source)` triple already
    /// exists — duplicates are ignored, not errors.
    async fn add_spread_history_point(&self, row: SpreadHistoryRow) -> bool;
    async fn list_recent_spread_history(&self, symbol: &str, limit: usize) -> Vec<SpreadHistoryRow>;
    async fn count_spread_history(&self, symbol: &str) -> usize;
    async fn trim_spread_history(&self, symbol: &str, keep: usize);
}

pub use memory::InMemoryStore;
