//! Per-caller token bucket.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// How often idle buckets are dropped.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * config.refill_per_sec).min(config.capacity);
    }
}

struct Buckets {
    by_key: HashMap<String, Bucket>,
    next_sweep: Instant,
}

/// Token buckets keyed by caller (credential, identity, IP or `anonymous`).
///
/// Each bucket holds up to `capacity` tokens and refills continuously at
/// `refill_per_sec`. A batch costs one token per operation and is admitted
/// only if the whole cost fits. Buckets that have refilled to capacity are
/// dropped on the next sweep; a fresh bucket starts full, so dropping one
/// changes nothing for its caller.
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<Buckets>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(Buckets {
                by_key: HashMap::new(),
                next_sweep: Instant::now() + SWEEP_INTERVAL,
            }),
        }
    }

    /// Takes `cost` tokens from `key`'s bucket. Returns `false`, taking
    /// nothing, if the bucket holds fewer.
    pub fn try_acquire(&self, key: &str, cost: u32) -> bool {
        self.try_acquire_at(key, cost, Instant::now())
    }

    fn try_acquire_at(&self, key: &str, cost: u32, now: Instant) -> bool {
        let mut buckets = self.buckets.lock();
        if now >= buckets.next_sweep {
            self.sweep(&mut buckets.by_key, now);
            buckets.next_sweep = now + SWEEP_INTERVAL;
        }

        let bucket = buckets.by_key.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.config.capacity,
            last_refill: now,
        });
        bucket.refill(now, &self.config);

        let cost = f64::from(cost.max(1));
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            tracing::warn!(key, tokens = bucket.tokens, cost, "rate limit exceeded");
            false
        }
    }

    fn sweep(&self, by_key: &mut HashMap<String, Bucket>, now: Instant) {
        let before = by_key.len();
        by_key.retain(|_, bucket| {
            bucket.refill(now, &self.config);
            bucket.tokens < self.config.capacity
        });
        let dropped = before - by_key.len();
        if dropped > 0 {
            tracing::debug!(dropped, tracked = by_key.len(), "idle rate limit buckets dropped");
        }
    }

    /// Number of callers currently tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.buckets.lock().by_key.len()
    }
}
