//! In-memory token bucket limiter keyed by client.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// New buckets created between two sweeps of refilled buckets.
pub const DEFAULT_PRUNE_EVERY: usize = 1024;

/// Simple in-memory token bucket rate limiter.
///
/// Every `prune_every` new clients, buckets that have refilled completely are
/// dropped, so the map tracks recently active clients only.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Client key → bucket state.
    buckets: Arc<Mutex<Buckets>>,
    /// Maximum tokens per bucket.
    max_tokens: u32,
    /// Token refill rate per second.
    refill_rate: f64,
    prune_every: usize,
}

#[derive(Debug, Default)]
struct Buckets {
    map: HashMap<String, TokenBucket>,
    created_since_prune: usize,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant, max_tokens: f64, refill_rate: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(max_tokens);
        self.last_refill = now;
    }
}

/// Snapshot of one client's bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStatus {
    /// Client key the bucket belongs to.
    pub key: String,
    /// Whole tokens left.
    pub remaining: u32,
    /// Bucket capacity.
    pub max_tokens: u32,
    /// Tokens restored per second.
    pub refill_per_second: f64,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(Buckets::default())),
            max_tokens,
            refill_rate,
            prune_every: DEFAULT_PRUNE_EVERY,
        }
    }

    /// Sets how many new clients are admitted between sweeps. Zero is treated as one.
    pub fn with_prune_every(mut self, prune_every: usize) -> Self {
        self.prune_every = prune_every.max(1);
        self
    }

    /// Attempts to consume a token for the given key.
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let max = f64::from(self.max_tokens);

        if !buckets.map.contains_key(key) {
            if buckets.created_since_prune >= self.prune_every {
                self.sweep(&mut buckets.map, now);
                buckets.created_since_prune = 0;
            }
            buckets.created_since_prune += 1;
        }

        let bucket = buckets.map.entry(key.to_string()).or_insert(TokenBucket {
            tokens: max,
            last_refill: now,
        });
        bucket.refill(now, max, self.refill_rate);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Reports a client's bucket without consuming from it.
    pub async fn status(&self, key: &str) -> BucketStatus {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let max = f64::from(self.max_tokens);

        let remaining = match buckets.map.get_mut(key) {
            Some(bucket) => {
                bucket.refill(now, max, self.refill_rate);
                bucket.tokens.floor() as u32
            }
            None => self.max_tokens,
        };

        BucketStatus {
            key: key.to_string(),
            remaining,
            max_tokens: self.max_tokens,
            refill_per_second: self.refill_rate,
        }
    }

    /// Drops buckets that have refilled completely; they behave like new ones.
    pub async fn prune(&self) -> usize {
        let mut buckets = self.buckets.lock().await;
        buckets.created_since_prune = 0;
        self.sweep(&mut buckets.map, Instant::now())
    }

    fn sweep(&self, map: &mut HashMap<String, TokenBucket>, now: Instant) -> usize {
        let max = f64::from(self.max_tokens);
        let before = map.len();

        map.retain(|_, bucket| {
            bucket.refill(now, max, self.refill_rate);
            bucket.tokens < max
        });
        let dropped = before - map.len();
        if dropped > 0 {
            tracing::debug!(dropped, tracked = map.len(), "Pruned refilled rate limit buckets");
        }
        dropped
    }

    /// Number of clients currently tracked.
    pub async fn tracked(&self) -> usize {
        self.buckets.lock().await.map.len()
    }

    /// Whole seconds until one token is restored, if the bucket ever refills.
    pub fn retry_after_secs(&self) -> Option<u64> {
        (self.refill_rate > 0.0).then(|| (1.0 / self.refill_rate).ceil().max(1.0) as u64)
    }
}
