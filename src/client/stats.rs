use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by one caching client
#[derive(Debug, Default)]
pub struct ClientStats {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: Mutex<BTreeMap<String, u64>>,
}

/// Point-in-time copy of the client counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub size: usize,
    pub requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub errors: BTreeMap<String, u64>,
}

impl ClientStats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, message: &str) {
        *self.errors.lock().entry(message.to_string()).or_insert(0) += 1;
    }

    pub fn snapshot(&self, size: usize) -> StatsSnapshot {
        StatsSnapshot {
            size,
            requests: self.requests.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            errors: self.errors.lock().clone(),
        }
    }
}
