//! Execution engine and the abstract venue adapter port (C8, C12).

pub mod adapter;
pub mod engine;

pub use adapter::{SimulatedAdapter, VenueAdapter};
pub use engine::{ExecutionEngine, FillHook};
