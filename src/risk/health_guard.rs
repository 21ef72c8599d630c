use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{HealthItem, Venue};

/// Per-venue liveness with a cached re-check interval and an open-gate
/// computation (C4).
pub struct HealthGuard {
    fail_threshold: u32,
    cache_ms: i64,
    items: Mutex<HashMap<Venue, HealthItem>>,
}

impl HealthGuard {
    pub fn new(fail_threshold: u32, cache_ms: i64) -> Self {
        Self {
            fail_threshold,
            cache_ms,
            items: Mutex::new(HashMap::new()),
        }
    }

    pub fn should_check(&self, venue: Venue, now_ms: i64) -> bool {
        match self.items.lock().get(&venue) {
            None => true,
            Some(item) => now_ms - item.last_check_ms >= self.cache_ms,
        }
    }

    pub fn update(&self, venue: Venue, ok: bool, message: impl Into<String>, now_ms: i64) {
        let mut items = self.items.lock();
        let item = items.entry(venue).or_default();
        item.last_check_ms = now_ms;
        item.ok = ok;
        item.message = message.into();
        if ok {
            item.fail_count = 0;
            item.last_ok_ms = now_ms;
        } else {
            item.fail_count += 1;
        }
    }

    pub fn can_open(&self) -> bool {
        let items = self.items.lock();
        if items.is_empty() {
            return false;
        }
        items
            .values()
            .all(|item| item.ok && item.fail_count < self.fail_threshold)
    }

    pub fn summary(&self) -> HashMap<Venue, HealthItem> {
        self.items.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_registered_venues_cannot_open() {
        let guard = HealthGuard::new(3, 1000);
        assert!(!guard.can_open());
    }

    #[test]
    fn fail_count_reaching_threshold_blocks_open() {
        let guard = HealthGuard::new(2, 1000);
        guard.update(Venue::A, true, "", 0);
        guard.update(Venue::B, true, "", 0);
        assert!(guard.can_open());

        guard.update(Venue::A, false, "timeout", 100);
        guard.update(Venue::A, false, "timeout", 200);
        assert!(!guard.can_open());
    }

    #[test]
    fn should_check_respects_cache_interval() {
        let guard = HealthGuard::new(3, 1000);
        assert!(guard.should_check(Venue::A, 0));
        guard.update(Venue::A, true, "", 0);
        assert!(!guard.should_check(Venue::A, 500));
        assert!(guard.should_check(Venue::A, 1000));
    }
}
