//! In-memory LRU cache of ROI estimates.
//!
//! The growth projector re-estimates the same (channel, budget, 1 month)
//! tuple every simulated month, and the optimizer probes every candidate at
//! the same budget. Estimates are pure, so memoizing them never changes a
//! result; entries live as long as the calculator (and its benchmark
//! snapshot) that produced them.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;

use crate::roi::RoiResult;

/// Budgets are keyed by bit pattern so that 1000.0 and 1000.0000001 never alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EstimateKey {
    channel: String,
    budget_bits: u64,
    duration_months: u32,
}

struct Inner {
    cache: LruCache<EstimateKey, RoiResult>,
    hits: u64,
    misses: u64,
}

/// Hit/miss counters for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
}

/// LRU of estimates, safe to share between threads.
pub struct EstimateCache {
    inner: Mutex<Inner>,
}

impl EstimateCache {
    /// `None` when `capacity` is 0 (caching disabled).
    pub fn new(capacity: usize) -> Option<Self> {
        let cap = NonZeroUsize::new(capacity)?;
        Some(Self {
            inner: Mutex::new(Inner {
                cache: LruCache::new(cap),
                hits: 0,
                misses: 0,
            }),
        })
    }

    pub fn get(&self, channel: &str, budget: f64, duration_months: u32) -> Option<RoiResult> {
        let key = EstimateKey {
            channel: channel.to_string(),
            budget_bits: budget.to_bits(),
            duration_months,
        };
        let mut g = self.inner.lock();
        match g.cache.get(&key).cloned() {
            Some(v) => {
                g.hits += 1;
                Some(v)
            }
            None => {
                g.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, result: &RoiResult) {
        let key = EstimateKey {
            channel: result.channel.clone(),
            budget_bits: result.budget.to_bits(),
            duration_months: result.duration_months,
        };
        self.inner.lock().cache.put(key, result.clone());
    }

    /// Remove all entries and reset hit/miss stats.
    pub fn clear(&self) {
        let mut g = self.inner.lock();
        g.cache.clear();
        g.hits = 0;
        g.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let g = self.inner.lock();
        CacheStats {
            entries: g.cache.len(),
            capacity: g.cache.cap().get(),
            hits: g.hits,
            misses: g.misses,
        }
    }
}

impl std::fmt::Debug for EstimateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstimateCache")
            .field("stats", &self.stats())
            .finish()
    }
}
