//! Domain value types shared across the engine. Every type here is a plain
//! value object — components own mutable state internally and hand these
//! out as copies.

pub mod bbo;
pub mod event;
pub mod health;
pub mod order;
pub mod position;
pub mod scanner;
pub mod spread;
pub mod status;
pub mod strategy;
pub mod symbol;
pub mod venue;

pub use bbo::{Bbo, QuoteSource};
pub use event::{EventLevel, EventRecord};
pub use health::{ConsistencyState, HealthItem, WsState};
pub use order::{ExecutionReport, OrderAck, OrderRequest, OrderType, Side, TradeFill};
pub use position::PositionState;
pub use scanner::{ScannerRow, SpreadHistoryRow, WarmupStatus};
pub use spread::{ArbitrageDirection, SignalAction, SpreadMetrics, SpreadSignal};
pub use status::{EngineStatus, RiskBucket, RiskState, SymbolSnapshot};
pub use strategy::{StrategyMode, StrategyParams};
pub use symbol::SymbolConfig;
pub use venue::{Scope, Venue};
