use crate::cert::Certificate;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cached certificate and the stamp of its most recent access
struct CacheEntry {
    certificate: Arc<Certificate>,
    last_access: AtomicU64,
}

/// Certificates keyed by index, trimmed to a capacity on demand.
///
/// Entries never expire on their own. Access times are logical stamps taken
/// from a per-cache counter, so two accesses never tie and the order of
/// eviction matches the order of access exactly. Hits only take the read
/// lock; the stamp is updated through the entry's atomic.
pub struct CertificateCache {
    entries: RwLock<HashMap<u64, CacheEntry>>,
    clock: AtomicU64,
    max_size: Option<usize>,
}

impl CertificateCache {
    /// A negative `max_size` leaves the cache unbounded
    pub fn new(max_size: i64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            max_size: usize::try_from(max_size).ok(),
        }
    }

    pub fn max_size(&self) -> Option<usize> {
        self.max_size
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Look up a certificate and mark it as just used
    pub fn get(&self, index: u64) -> Option<Arc<Certificate>> {
        let entries = self.entries.read();
        let entry = entries.get(&index)?;
        entry.last_access.store(self.tick(), Ordering::Relaxed);
        Some(Arc::clone(&entry.certificate))
    }

    /// Insert or overwrite the entry for `index`
    pub fn insert(&self, index: u64, certificate: Arc<Certificate>) {
        let entry = CacheEntry {
            certificate,
            last_access: AtomicU64::new(self.tick()),
        };
        self.entries.write().insert(index, entry);
    }

    pub fn contains(&self, index: u64) -> bool {
        self.entries.read().contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Evict least recently used entries until the cache fits its capacity.
    ///
    /// Returns the number of evicted entries. Does nothing on an unbounded
    /// cache.
    pub fn prune(&self) -> usize {
        let Some(max_size) = self.max_size else {
            return 0;
        };

        let mut entries = self.entries.write();
        if entries.len() <= max_size {
            return 0;
        }

        let mut oldest: BinaryHeap<Reverse<(u64, u64)>> = entries
            .iter()
            .map(|(index, entry)| Reverse((entry.last_access.load(Ordering::Relaxed), *index)))
            .collect();

        let mut evicted = 0;
        while entries.len() > max_size {
            let Some(Reverse((stamp, index))) = oldest.pop() else {
                break;
            };
            entries.remove(&index);
            tracing::trace!("Evicted certificate {} (last access {})", index, stamp);
            evicted += 1;
        }

        evicted
    }
}
