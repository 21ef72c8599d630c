use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::{Bbo, Venue};

#[derive(Default, Clone, Copy)]
struct Slots {
    ws: Option<Bbo>,
    rest: Option<Bbo>,
}

/// Holds the latest WS and REST top-of-book per (venue, symbol). Overwrites
/// unconditionally — out-of-order detection is the venue adapter's job, not
/// this cache's.
pub struct OrderBookCache {
    slots: RwLock<HashMap<(String, Venue), Slots>>,
}

impl OrderBookCache {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn update_ws(&self, symbol: &str, venue: Venue, bbo: Bbo) {
        let mut slots = self.slots.write();
        slots.entry((symbol.to_string(), venue)).or_default().ws = Some(bbo);
    }

    pub fn update_rest(&self, symbol: &str, venue: Venue, bbo: Bbo) {
        let mut slots = self.slots.write();
        slots.entry((symbol.to_string(), venue)).or_default().rest = Some(bbo);
    }

    pub fn ws(&self, symbol: &str, venue: Venue) -> Option<Bbo> {
        self.slots.read().get(&(symbol.to_string(), venue)).and_then(|s| s.ws)
    }

    pub fn rest(&self, symbol: &str, venue: Venue) -> Option<Bbo> {
        self.slots.read().get(&(symbol.to_string(), venue)).and_then(|s| s.rest)
    }

    /// Preferred top-of-book for a venue: WS if present, else REST.
    pub fn effective(&self, symbol: &str, venue: Venue) -> Option<Bbo> {
        let slots = self.slots.read();
        let slot = slots.get(&(symbol.to_string(), venue))?;
        slot.ws.or(slot.rest)
    }

    pub fn effective_pair(&self, symbol: &str) -> Option<(Bbo, Bbo)> {
        let a = self.effective(symbol, Venue::A)?;
        let b = self.effective(symbol, Venue::B)?;
        Some((a, b))
    }

    pub fn is_stale(&self, symbol: &str, now_ms: i64, stale_ms: i64) -> bool {
        let a_ws = self.ws(symbol, Venue::A);
        let b_ws = self.ws(symbol, Venue::B);
        match (a_ws, b_ws) {
            (Some(a), Some(b)) => {
                now_ms - a.timestamp_ms > stale_ms || now_ms - b.timestamp_ms > stale_ms
            }
            _ => true,
        }
    }
}

impl Default for OrderBookCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuoteSource;
    use rust_decimal_macros::dec;

    fn bbo(ts: i64) -> Bbo {
        Bbo::new(dec!(100.0), dec!(100.2), ts, QuoteSource::Ws)
    }

    #[test]
    fn missing_either_leg_is_stale() {
        let cache = OrderBookCache::new();
        cache.update_ws("BTC", Venue::A, bbo(1000));
        assert!(cache.is_stale("BTC", 1000, 500));
    }

    #[test]
    fn stale_when_either_leg_too_old() {
        let cache = OrderBookCache::new();
        cache.update_ws("BTC", Venue::A, bbo(0));
        cache.update_ws("BTC", Venue::B, bbo(1000));
        assert!(cache.is_stale("BTC", 2000, 500));
        assert!(!cache.is_stale("BTC", 1100, 500));
    }

    #[test]
    fn effective_prefers_ws_over_rest() {
        let cache = OrderBookCache::new();
        cache.update_rest("BTC", Venue::A, bbo(1));
        cache.update_ws("BTC", Venue::A, bbo(2));
        assert_eq!(cache.effective("BTC", Venue::A).unwrap().timestamp_ms, 2);
    }
}
