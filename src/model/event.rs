use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One entry in the event/audit feed. Broadcast to control-plane subscribers
/// and handed to the persistence port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub ts_ms: i64,
    pub level: EventLevel,
    pub source: String,
    pub message: String,
    pub data: serde_json::Value,
}

impl EventRecord {
    pub fn new(
        level: EventLevel,
        source: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
        ts_ms: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ts_ms,
            level,
            source: source.into(),
            message: message.into(),
            data,
        }
    }
}
