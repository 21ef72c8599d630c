use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{Venue, WsState};

/// Per-venue connectivity and idle-timeout tracking (C5).
pub struct WsSupervisor {
    idle_timeout_ms: i64,
    states: Mutex<HashMap<Venue, WsState>>,
}

impl WsSupervisor {
    pub fn new(idle_timeout_sec: i64) -> Self {
        Self {
            idle_timeout_ms: idle_timeout_sec * 1000,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn mark_connected(&self, venue: Venue) {
        self.states.lock().entry(venue).or_default().connected = true;
    }

    pub fn mark_message(&self, venue: Venue, now_ms: i64) {
        let mut states = self.states.lock();
        let state = states.entry(venue).or_default();
        state.connected = true;
        state.last_message_ms = now_ms;
    }

    pub fn mark_disconnected(&self, venue: Venue, now_ms: i64) {
        let mut states = self.states.lock();
        let state = states.entry(venue).or_default();
        state.connected = false;
        state.reconnect_count += 1;
        state.last_disconnect_ms = now_ms;
    }

    pub fn is_ok(&self, now_ms: i64) -> bool {
        let states = self.states.lock();
        if states.is_empty() {
            return false;
        }
        states.values().all(|state| {
            state.connected
                && (state.last_message_ms == 0
                    || now_ms - state.last_message_ms <= self.idle_timeout_ms)
        })
    }

    pub fn snapshot(&self) -> HashMap<Venue, WsState> {
        self.states.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_registered_venues_is_not_ok() {
        let sup = WsSupervisor::new(8);
        assert!(!sup.is_ok(0));
    }

    #[test]
    fn disconnect_trips_is_ok_until_message_returns() {
        let sup = WsSupervisor::new(8);
        sup.mark_message(Venue::A, 0);
        sup.mark_message(Venue::B, 0);
        assert!(sup.is_ok(100));

        sup.mark_disconnected(Venue::A, 200);
        assert!(!sup.is_ok(300));

        sup.mark_message(Venue::A, 400);
        assert!(sup.is_ok(400));
        assert_eq!(sup.snapshot()[&Venue::A].reconnect_count, 1);
    }

    #[test]
    fn idle_timeout_trips_is_ok() {
        let sup = WsSupervisor::new(1);
        sup.mark_message(Venue::A, 0);
        sup.mark_message(Venue::B, 0);
        assert!(sup.is_ok(1000));
        assert!(!sup.is_ok(1001));
    }
}
