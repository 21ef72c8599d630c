//! Cross-venue perpetual-futures arbitrage engine.
//!
//! Wires together risk gating, spread statistics, two-leg execution, the
//! dual-leg position ledger, the universe scanner, and the per-symbol
//! orchestrator loop behind a small operator-facing control plane. Callers
//! outside this crate (a binary, a test harness) construct an `AppConfig`,
//! a set of `VenueAdapter`s, and a `PersistencePort`, then build an
//! [`orchestrator::Engine`].

pub mod config;
pub mod control_plane;
pub mod error;
pub mod execution;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod position_ledger;
pub mod risk;
pub mod scanner;
pub mod spread_engine;

pub use config::AppConfig;
pub use control_plane::ControlPlane;
pub use error::{EngineError, EngineResult};
pub use orchestrator::Engine;
