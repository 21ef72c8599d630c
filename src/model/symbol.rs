use serde::{Deserialize, Serialize};

/// Static per-symbol configuration, immutable once the engine has loaded it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub venue_a_market: String,
    pub venue_b_market: String,
    pub enabled: bool,
}
