use serde::{Deserialize, Serialize};

/// Liveness state for one venue, owned by [`crate::risk::health_guard::HealthGuard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthItem {
    pub ok: bool,
    pub fail_count: u32,
    pub last_ok_ms: i64,
    pub last_check_ms: i64,
    pub message: String,
}

impl HealthItem {
    pub fn new() -> Self {
        Self {
            ok: false,
            fail_count: 0,
            last_ok_ms: 0,
            last_check_ms: 0,
            message: String::new(),
        }
    }
}

impl Default for HealthItem {
    fn default() -> Self {
        Self::new()
    }
}

/// Connectivity state for one venue, owned by [`crate::risk::ws_supervisor::WsSupervisor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsState {
    pub connected: bool,
    pub reconnect_count: u32,
    pub last_message_ms: i64,
    pub last_disconnect_ms: i64,
}

impl WsState {
    pub fn new() -> Self {
        Self {
            connected: false,
            reconnect_count: 0,
            last_message_ms: 0,
            last_disconnect_ms: 0,
        }
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-check outcome for one symbol, owned by
/// [`crate::risk::consistency_guard::ConsistencyGuard`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyState {
    pub failed_count: u32,
    pub ok: bool,
    pub last_reason: String,
}

impl ConsistencyState {
    pub fn new() -> Self {
        Self {
            failed_count: 0,
            ok: true,
            last_reason: String::new(),
        }
    }
}

impl Default for ConsistencyState {
    fn default() -> Self {
        Self::new()
    }
}
