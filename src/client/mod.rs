//! Caching client of the key server.
//!
//! Certificates fetched by index are kept in a bounded cache. Cached entries
//! never expire; a background task trims the cache back to its capacity on a
//! fixed period, dropping the least recently used entries first.

pub mod cache;
pub mod stats;

pub use cache::CertificateCache;
pub use stats::{ClientStats, StatsSnapshot};

use crate::cert::{Certificate, CertificateSummary};
use crate::config::ClientConfig;
use crate::rpc::{HttpKeyTransport, KeySource};
use crate::utils::errors::{KeyServerError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub struct KeyClient {
    source: Arc<dyn KeySource>,
    cache: Arc<CertificateCache>,
    stats: ClientStats,
    timeout: Duration,
    stop: watch::Sender<bool>,
    pruner: Mutex<Option<JoinHandle<()>>>,
}

impl KeyClient {
    /// Connect to the key server named in the configuration.
    ///
    /// Must be called from within a Tokio runtime, since the prune task is
    /// spawned right away.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpKeyTransport::new(&config.server, config.timeout)?;
        tracing::debug!("Key client for {}", transport.base_url());
        Self::with_source(Arc::new(transport), &config)
    }

    /// Build a client over any certificate source
    pub fn with_source(source: Arc<dyn KeySource>, config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(CertificateCache::new(config.max_cache_size));
        let (stop, stopped) = watch::channel(false);

        let pruner = if cache.max_size().is_some() {
            Some(spawn_pruner(
                Arc::clone(&cache),
                config.prune_interval,
                stopped,
            ))
        } else {
            tracing::debug!("Cache pruning disabled");
            None
        };

        Ok(Self {
            source,
            cache,
            stats: ClientStats::default(),
            timeout: config.timeout,
            stop,
            pruner: Mutex::new(pruner),
        })
    }

    /// Certificate with the given index, from the cache when present.
    ///
    /// Failures are returned unchanged and never cached. Concurrent misses
    /// on the same index may each reach the server.
    pub async fn retrieve_certificate_by_index(&self, index: u64) -> Result<Arc<Certificate>> {
        self.stats.record_request();

        if let Some(certificate) = self.cache.get(index) {
            tracing::trace!("Cache hit for certificate {}", index);
            self.stats.record_hit();
            return Ok(certificate);
        }

        tracing::debug!("Cache miss for certificate {}", index);
        self.stats.record_miss();

        match self.fetch(index).await {
            Ok(certificate) => {
                let certificate = Arc::new(certificate);
                self.cache.insert(index, Arc::clone(&certificate));
                Ok(certificate)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch certificate {}: {}", index, e);
                self.stats.record_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn fetch(&self, index: u64) -> Result<Certificate> {
        let data = time::timeout(self.timeout, self.source.retrieve_certificate_by_index(index))
            .await
            .map_err(|_| KeyServerError::TimedOut)??;

        let der = data.der_certificate.ok_or_else(|| {
            KeyServerError::Parse(format!("No DER payload for certificate {index}"))
        })?;
        Certificate::from_der(der)
    }

    /// Display fields of up to `count` certificates starting at `start_index`.
    ///
    /// Not cached.
    pub async fn list_certificates(
        &self,
        start_index: u64,
        count: i32,
    ) -> Result<Vec<CertificateSummary>> {
        let list = time::timeout(
            self.timeout,
            self.source.list_certificates(start_index, count),
        )
        .await
        .map_err(|_| KeyServerError::TimedOut)??;

        list.records.iter().map(CertificateSummary::try_from).collect()
    }

    pub fn cache(&self) -> &CertificateCache {
        &self.cache
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot(self.cache.len())
    }

    /// Stop the prune task and wait for it to finish
    pub async fn shutdown(&self) {
        let _ = self.stop.send(true);

        let handle = self.pruner.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Cache prune task failed: {}", e);
            }
        }
    }
}

impl Drop for KeyClient {
    fn drop(&mut self) {
        // Wakes the prune task; it exits on its own
        let _ = self.stop.send(true);
    }
}

fn spawn_pruner(
    cache: Arc<CertificateCache>,
    period: Duration,
    mut stopped: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = cache.prune();
                    if evicted > 0 {
                        tracing::info!(
                            evicted = evicted,
                            remaining = cache.len(),
                            "Pruned certificate cache"
                        );
                    }
                }
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Cache prune task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::{KeyData, KeyDataList, KeyService};
    use crate::storage::CertificateStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LEAF_DERS: [&[u8]; 5] = [
        include_bytes!("../../tests/fixtures/leaf-1.der"),
        include_bytes!("../../tests/fixtures/leaf-2.der"),
        include_bytes!("../../tests/fixtures/leaf-3.der"),
        include_bytes!("../../tests/fixtures/leaf-4.der"),
        include_bytes!("../../tests/fixtures/leaf-5.der"),
    ];

    /// Serves the leaf fixtures and counts calls
    #[derive(Default)]
    struct FakeSource {
        calls: AtomicUsize,
        delay: Option<Duration>,
        broken_der: bool,
    }

    #[async_trait]
    impl KeySource for FakeSource {
        async fn retrieve_certificate_by_index(&self, index: u64) -> Result<KeyData> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                time::sleep(delay).await;
            }

            let der = usize::try_from(index)
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| LEAF_DERS.get(i))
                .ok_or_else(|| KeyServerError::NotFound(format!("No certificate {index}")))?;
            let der = if self.broken_der {
                b"not a certificate".to_vec()
            } else {
                der.to_vec()
            };

            Ok(KeyData {
                index,
                subject: String::new(),
                issuer: String::new(),
                expires: 0,
                der_certificate: Some(der),
            })
        }

        async fn list_certificates(&self, _start_index: u64, _count: i32) -> Result<KeyDataList> {
            Ok(KeyDataList::default())
        }
    }

    fn config(max_cache_size: i64) -> ClientConfig {
        ClientConfig {
            max_cache_size,
            timeout: Duration::from_millis(200),
            prune_interval: Duration::from_millis(20),
            ..ClientConfig::default()
        }
    }

    fn client(source: FakeSource, max_cache_size: i64) -> (KeyClient, Arc<FakeSource>) {
        let source = Arc::new(source);
        let client = KeyClient::with_source(source.clone(), &config(max_cache_size)).unwrap();
        (client, source)
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_hit() {
        let (client, source) = client(FakeSource::default(), -1);

        let first = client.retrieve_certificate_by_index(2).await.unwrap();
        let second = client.retrieve_certificate_by_index(2).await.unwrap();

        assert_eq!(first.der(), LEAF_DERS[1]);
        assert_eq!(first.der(), second.der());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let stats = client.stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let (client, source) = client(FakeSource::default(), -1);

        for _ in 0..2 {
            let err = client.retrieve_certificate_by_index(42).await.unwrap_err();
            assert!(matches!(err, KeyServerError::NotFound(_)));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.cache_len(), 0);

        let stats = client.stats();
        assert_eq!(stats.errors.values().sum::<u64>(), 2);
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_cached() {
        let source = FakeSource {
            broken_der: true,
            ..FakeSource::default()
        };
        let (client, _) = client(source, -1);

        let err = client.retrieve_certificate_by_index(1).await.unwrap_err();
        assert!(matches!(err, KeyServerError::Parse(_)));
        assert_eq!(client.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let source = FakeSource {
            delay: Some(Duration::from_millis(500)),
            ..FakeSource::default()
        };
        let (client, _) = client(source, -1);

        let err = client.retrieve_certificate_by_index(1).await.unwrap_err();
        assert!(matches!(err, KeyServerError::TimedOut));
        assert_eq!(client.cache_len(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_agree() {
        let source = FakeSource {
            delay: Some(Duration::from_millis(10)),
            ..FakeSource::default()
        };
        let (client, _) = client(source, -1);
        let client = Arc::new(client);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.retrieve_certificate_by_index(3).await })
            })
            .collect();

        for task in tasks {
            let cert = task.await.unwrap().unwrap();
            assert_eq!(cert.der(), LEAF_DERS[2]);
        }
        assert_eq!(client.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_prune_task_trims_to_capacity() {
        let (client, _) = client(FakeSource::default(), 3);

        for index in 1..=5 {
            client.retrieve_certificate_by_index(index).await.unwrap();
        }

        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.cache_len(), 3);
        for index in [3, 4, 5] {
            assert!(client.cache().contains(index));
        }

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_pruning() {
        let (client, _) = client(FakeSource::default(), 1);
        client.shutdown().await;

        for index in 1..=3 {
            client.retrieve_certificate_by_index(index).await.unwrap();
        }
        time::sleep(Duration::from_millis(60)).await;
        assert_eq!(client.cache_len(), 3);

        // Second call is a no-op
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_stops_pruning() {
        let (client, _) = client(FakeSource::default(), 1);
        let handle = client.pruner.lock().take().unwrap();
        let cache = Arc::downgrade(&client.cache);

        drop(client);

        time::timeout(Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(cache.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_zero_prune_interval_rejected() {
        let config = ClientConfig {
            prune_interval: Duration::ZERO,
            ..ClientConfig::default()
        };
        let result = KeyClient::with_source(Arc::new(FakeSource::default()), &config);
        assert!(matches!(result, Err(KeyServerError::Config(_))));
    }

    #[tokio::test]
    async fn test_in_process_service_source() {
        let store = Arc::new(CertificateStore::in_memory());
        for der in LEAF_DERS {
            let cert = Certificate::from_der(der.to_vec()).unwrap();
            store.add_certificate(&cert).await.unwrap();
        }
        let service = Arc::new(KeyService::new(store));
        let client = KeyClient::with_source(service, &config(-1)).unwrap();

        let cert = client.retrieve_certificate_by_index(4).await.unwrap();
        assert_eq!(cert.index, 4);

        let list = client.list_certificates(2, 2).await.unwrap();
        let indices: Vec<u64> = list.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![2, 3]);
    }
}
