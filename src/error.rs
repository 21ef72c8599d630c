use thiserror::Error;

/// Domain error kinds with distinct escalation policies. Most are swallowed
/// at the orchestrator boundary and turned into an [`crate::model::EventRecord`];
/// only [`EngineError::Config`] is fatal and aborts startup.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transient venue error on {venue}: {message}")]
    TransientVenue { venue: String, message: String },

    #[error("rate limited: {venue}/{scope}")]
    RateLimited { venue: String, scope: String },

    #[error("stale data for {symbol}")]
    StaleData { symbol: String },

    #[error("consistency check failed for {symbol}: {reason}")]
    ConsistencyFail { symbol: String, reason: String },

    #[error("websocket down: {venue}")]
    WsDown { venue: String },

    #[error("health check failed: {venue}")]
    HealthDown { venue: String },

    #[error("hard position limit breached for {symbol}: net={net}")]
    HardLimitBreach {
        symbol: String,
        net: rust_decimal::Decimal,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("scan failed: {0}")]
    ScanFailure(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
