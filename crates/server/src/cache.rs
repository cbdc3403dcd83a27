// crates/server/src/cache.rs
//! Keyed TTL cache for bandwidth probes.
//!
//! Bandwidth probes take tens of seconds and hammer the uplink, so results
//! are shared across all callers for a fixed TTL. Each key owns an async
//! mutex slot: concurrent requests for the same key line up behind one
//! probe (single-flight) while distinct keys probe concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

use crate::probe::NetworkProbe;
use lanscape_core::NetworkMetrics;

/// Default reuse window for a cached probe result.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct Slot {
    fetched_at: Option<Instant>,
    value: NetworkMetrics,
}

pub struct ProbeCache {
    ttl: Duration,
    slots: Mutex<HashMap<String, Arc<Mutex<Slot>>>>,
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch bandwidth metrics for `key`, reusing a fresh cached result or
    /// running one probe on behalf of every waiter.
    pub async fn bandwidth(&self, probe: &dyn NetworkProbe, key: &str) -> NetworkMetrics {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.to_string()).or_default().clone()
        };

        // Holding the per-key slot across the probe is what makes this
        // single-flight: late arrivals block here, then hit the fresh value.
        let mut guard = slot.lock().await;
        if let Some(fetched_at) = guard.fetched_at {
            if fetched_at.elapsed() < self.ttl {
                debug!(key, "probe cache hit");
                return guard.value.clone();
            }
        }

        let value = probe.bandwidth(key).await;
        guard.fetched_at = Some(Instant::now());
        guard.value = value.clone();
        value
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use async_trait::async_trait;
    use lanscape_core::Device;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Probe that counts invocations and returns a fixed download speed.
    struct CountingProbe {
        calls: AtomicUsize,
    }

    impl CountingProbe {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NetworkProbe for CountingProbe {
        async fn bandwidth(&self, _target: &str) -> NetworkMetrics {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            // Yield so concurrent callers can pile up on the slot.
            tokio::task::yield_now().await;
            NetworkMetrics {
                download_speed: Some(n as f64),
                ..NetworkMetrics::unavailable()
            }
        }

        async fn scan(&self) -> Result<Vec<Device>, ProbeError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_cache_reuses_result_within_ttl() {
        let probe = CountingProbe::new();
        let cache = ProbeCache::new(Duration::from_secs(60));

        let first = cache.bandwidth(&probe, "u1").await;
        let second = cache.bandwidth(&probe, "u1").await;
        assert_eq!(first.download_speed, Some(1.0));
        assert_eq!(second.download_speed, Some(1.0));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_expires_after_ttl() {
        let probe = CountingProbe::new();
        let cache = ProbeCache::new(Duration::from_millis(10));

        cache.bandwidth(&probe, "u1").await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = cache.bandwidth(&probe, "u1").await;
        assert_eq!(second.download_speed, Some(2.0));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_distinct_keys_probe_independently() {
        let probe = CountingProbe::new();
        let cache = ProbeCache::new(Duration::from_secs(60));

        cache.bandwidth(&probe, "u1").await;
        cache.bandwidth(&probe, "u2").await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_probe() {
        let probe = Arc::new(CountingProbe::new());
        let cache = Arc::new(ProbeCache::new(Duration::from_secs(60)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let probe = probe.clone();
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.bandwidth(probe.as_ref(), "shared").await
            }));
        }
        for handle in handles {
            let metrics = handle.await.unwrap();
            assert_eq!(metrics.download_speed, Some(1.0));
        }
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }
}
