use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::EngineError;
use crate::model::{Scope, Venue};

/// Point-in-time view of one bucket's fill level.
#[derive(Debug, Clone, Copy)]
pub struct BucketStats {
    pub rate_per_sec: f64,
    pub capacity: f64,
    pub tokens: f64,
}

/// A single token bucket. Refill and debit happen inside one lock so the
/// critical section never suspends; only the cooperative wait loop in
/// [`TokenBucket::acquire`] awaits.
struct TokenBucket {
    rate_per_sec: f64,
    capacity: f64,
    tokens: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill_at: Instant,
}

impl TokenBucket {
    fn new(rate_per_sec: f64, capacity: f64) -> Result<Self, EngineError> {
        if rate_per_sec <= 0.0 || capacity <= 0.0 {
            return Err(EngineError::Config(
                "token bucket rate and capacity must be positive".into(),
            ));
        }
        Ok(Self {
            rate_per_sec,
            capacity,
            tokens: Mutex::new(BucketState {
                tokens: capacity,
                last_refill_at: Instant::now(),
            }),
        })
    }

    fn refill_locked(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill_at).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill_at = now;
    }

    async fn acquire(&self, tokens: f64, timeout: Duration) -> Result<bool, EngineError> {
        if tokens > self.capacity {
            return Err(EngineError::Config(format!(
                "requested {tokens} tokens exceeds bucket capacity {}",
                self.capacity
            )));
        }
        let deadline = Instant::now() + timeout;
        loop {
            let wait_secs = {
                let mut state = self.tokens.lock().await;
                self.refill_locked(&mut state);
                if state.tokens >= tokens {
                    state.tokens -= tokens;
                    return Ok(true);
                }
                (tokens - state.tokens) / self.rate_per_sec
            };
            if Instant::now() >= deadline {
                return Ok(false);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(Duration::from_secs_f64(wait_secs.min(0.05)).min(remaining))
                .await;
        }
    }

    async fn try_acquire(&self, tokens: f64) -> Result<bool, EngineError> {
        if tokens > self.capacity {
            return Err(EngineError::Config(format!(
                "requested {tokens} tokens exceeds bucket capacity {}",
                self.capacity
            )));
        }
        let mut state = self.tokens.lock().await;
        self.refill_locked(&mut state);
        if state.tokens >= tokens {
            state.tokens -= tokens;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn stats(&self) -> BucketStats {
        let mut state = self.tokens.lock().await;
        self.refill_locked(&mut state);
        BucketStats {
            rate_per_sec: self.rate_per_sec,
            capacity: self.capacity,
            tokens: state.tokens,
        }
    }
}

/// Per-(venue, scope) token buckets. Scopes that were never registered are
/// treated as unlimited, matching the reference implementation.
pub struct RateLimiter {
    buckets: HashMap<(Venue, Scope), TokenBucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    pub fn register(&mut self, venue: Venue, scope: Scope, rate_per_sec: f64, capacity: f64) -> Result<(), EngineError> {
        self.buckets
            .insert((venue, scope), TokenBucket::new(rate_per_sec, capacity)?);
        Ok(())
    }

    pub async fn acquire(&self, venue: Venue, scope: Scope, tokens: f64, timeout: Duration) -> Result<bool, EngineError> {
        match self.buckets.get(&(venue, scope)) {
            Some(bucket) => bucket.acquire(tokens, timeout).await,
            None => Ok(true),
        }
    }

    pub async fn try_acquire(&self, venue: Venue, scope: Scope, tokens: f64) -> Result<bool, EngineError> {
        match self.buckets.get(&(venue, scope)) {
            Some(bucket) => bucket.try_acquire(tokens).await,
            None => Ok(true),
        }
    }

    pub async fn snapshot(&self) -> HashMap<(Venue, Scope), BucketStats> {
        let mut out = HashMap::new();
        for (key, bucket) in &self.buckets {
            out.insert(*key, bucket.stats().await);
        }
        out
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_rejects_non_positive_rate_or_capacity() {
        assert!(TokenBucket::new(0.0, 10.0).is_err());
        assert!(TokenBucket::new(10.0, 0.0).is_err());
        assert!(TokenBucket::new(10.0, 10.0).is_ok());
    }

    #[tokio::test]
    async fn acquire_rejects_request_above_capacity() {
        let bucket = TokenBucket::new(1.0, 5.0).unwrap();
        let err = bucket.acquire(10.0, Duration::from_millis(10)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn acquire_drains_then_refills_up_to_capacity() {
        let bucket = TokenBucket::new(100.0, 5.0).unwrap();
        for _ in 0..5 {
            assert!(bucket.try_acquire(1.0).await.unwrap());
        }
        assert!(!bucket.try_acquire(1.0).await.unwrap());

        sleep(Duration::from_millis(60)).await;
        let stats = bucket.stats().await;
        assert!(stats.tokens <= stats.capacity);
        assert!(stats.tokens > 0.0);
    }

    #[tokio::test]
    async fn unregistered_scope_is_unlimited() {
        let limiter = RateLimiter::new();
        assert!(limiter
            .acquire(Venue::A, Scope::Order, 1_000_000.0, Duration::from_millis(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn acquire_times_out_when_bucket_stays_empty() {
        let mut limiter = RateLimiter::new();
        limiter.register(Venue::A, Scope::Order, 0.001, 1.0).unwrap();
        assert!(limiter.try_acquire(Venue::A, Scope::Order, 1.0).await.unwrap());
        let ok = limiter
            .acquire(Venue::A, Scope::Order, 1.0, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(!ok);
    }
}
