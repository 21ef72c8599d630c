//! Risk and liveness gating components (C1, C2, C3, C4, C5).

pub mod consistency_guard;
pub mod health_guard;
pub mod order_book_cache;
pub mod rate_limiter;
pub mod ws_supervisor;

pub use consistency_guard::ConsistencyGuard;
pub use health_guard::HealthGuard;
pub use order_book_cache::OrderBookCache;
pub use rate_limiter::{BucketStats, RateLimiter};
pub use ws_supervisor::WsSupervisor;
