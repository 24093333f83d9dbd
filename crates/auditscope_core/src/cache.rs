//! Cache - Query Results Keyed by Identifier, with TTL
//!
//! A single-process keyed store. Reads take the shared side of an RwLock;
//! writes take the exclusive side. Hit/miss counters are atomics and may be
//! read without the lock. A background sweeper evicts expired entries every
//! five minutes; `get` also evicts on access when the entry it finds has
//! already expired, and reports a miss.
//!
//! # Lock Invariant
//!
//! The entries lock is held only for map operations, never across I/O.

use crate::types::QueryResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// How often the background sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// One cached result with its insertion time and lifetime.
#[derive(Debug, Clone)]
struct CacheEntry {
    result: QueryResult,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self) -> bool {
        self.inserted_at.elapsed() > self.ttl
    }

    fn age(&self) -> Duration {
        self.inserted_at.elapsed()
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, zero when both are zero.
    pub hit_rate: f64,
    pub age_buckets: AgeBuckets,
}

/// Entry counts by age, for the stats report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeBuckets {
    pub under_1m: usize,
    pub under_1h: usize,
    pub under_24h: usize,
    pub over_24h: usize,
}

impl AgeBuckets {
    fn count(&mut self, age: Duration) {
        if age < Duration::from_secs(60) {
            self.under_1m += 1;
        } else if age < Duration::from_secs(60 * 60) {
            self.under_1h += 1;
        } else if age < Duration::from_secs(24 * 60 * 60) {
            self.under_24h += 1;
        } else {
            self.over_24h += 1;
        }
    }
}

/// Keyed query-result store with TTL.
#[derive(Debug)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    default_ttl: Duration,
}

impl QueryCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a result. Expired entries are evicted on access and count as
    /// misses.
    pub fn get(&self, query_id: &str) -> Option<QueryResult> {
        let expired = {
            let entries = self.entries.read().expect("cache lock poisoned");
            match entries.get(query_id) {
                Some(entry) if !entry.expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.result.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            let mut entries = self.entries.write().expect("cache lock poisoned");
            // Re-check under the exclusive lock; another writer may have
            // replaced the entry since the read.
            if entries.get(query_id).map(|e| e.expired()) == Some(true) {
                entries.remove(query_id);
                debug!("Evicted expired cache entry on access: {}", query_id);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert under the default TTL.
    pub fn set(&self, query_id: impl Into<String>, result: QueryResult) {
        self.set_with_ttl(query_id, result, self.default_ttl);
    }

    /// Insert under an explicit TTL.
    pub fn set_with_ttl(
        &self,
        query_id: impl Into<String>,
        result: QueryResult,
        ttl: Duration,
    ) {
        let query_id = query_id.into();
        let entry = CacheEntry {
            result,
            inserted_at: Instant::now(),
            ttl,
        };
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(query_id, entry);
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, query_id: &str) -> bool {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.remove(query_id).is_some()
    }

    /// Drop every entry. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let dropped = entries.len();
        entries.clear();
        dropped
    }

    pub fn size(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    /// Snapshot the statistics.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let (size, age_buckets) = {
            let entries = self.entries.read().expect("cache lock poisoned");
            let mut buckets = AgeBuckets::default();
            for entry in entries.values() {
                buckets.count(entry.age());
            }
            (entries.len(), buckets)
        };

        CacheStats {
            size,
            hits,
            misses,
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
            age_buckets,
        }
    }

    /// Zero the hit/miss counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Remove every expired entry. Returns how many went.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| !entry.expired());
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!("Sweeper evicted {} expired cache entries", evicted);
        }
        evicted
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Handle to the background sweeper. Dropping it (or calling `stop`) wakes
/// the thread and shuts it down.
#[derive(Debug)]
pub struct SweeperHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the periodic eviction sweep on a dedicated thread.
pub fn spawn_sweeper(cache: Arc<QueryCache>, interval: Duration) -> SweeperHandle {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::Builder::new()
        .name("cache-sweeper".to_string())
        .spawn(move || {
            info!("Cache sweeper started ({}s interval)", interval.as_secs());
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        cache.evict_expired();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("Cache sweeper stopped");
        })
        .expect("Failed to spawn cache sweeper thread");

    SweeperHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_id(id: &str) -> QueryResult {
        QueryResult {
            query_id: id.to_string(),
            command: "oc adm node-logs --role=master --path=audit/audit.log".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_set_get_roundtrip() {
        let cache = QueryCache::default();
        cache.set("k", result_with_id("k"));

        let found = cache.get("k").unwrap();
        assert_eq!(found.query_id, "k");
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_miss_then_delete_roundtrip() {
        let cache = QueryCache::default();
        assert!(cache.get("absent").is_none());
        assert_eq!(cache.stats().misses, 1);

        cache.set("k", result_with_id("k"));
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn test_expiry_on_access_counts_miss() {
        let cache = QueryCache::default();
        cache.set_with_ttl("k", result_with_id("k"), Duration::from_millis(1));
        thread::sleep(Duration::from_millis(10));

        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.size(), 0, "expired entry evicted on access");
    }

    #[test]
    fn test_hit_rate_definition() {
        let cache = QueryCache::default();
        assert_eq!(cache.stats().hit_rate, 0.0, "zero denominator is 0.0");

        cache.set("k", result_with_id("k"));
        cache.get("k");
        cache.get("k");
        cache.get("absent");

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_stats() {
        let cache = QueryCache::default();
        cache.get("absent");
        cache.reset_stats();
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 0);
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_clear_reports_count() {
        let cache = QueryCache::default();
        cache.set("a", result_with_id("a"));
        cache.set("b", result_with_id("b"));
        assert_eq!(cache.clear(), 2);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_evict_expired_only_removes_expired() {
        let cache = QueryCache::default();
        cache.set_with_ttl("stale", result_with_id("stale"), Duration::from_millis(1));
        cache.set_with_ttl("fresh", result_with_id("fresh"), Duration::from_secs(3600));
        thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.size(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_age_buckets() {
        let cache = QueryCache::default();
        cache.set("young", result_with_id("young"));
        let stats = cache.stats();
        assert_eq!(stats.age_buckets.under_1m, 1);
        assert_eq!(stats.age_buckets.over_24h, 0);
    }

    #[test]
    fn test_sweeper_evicts_in_background() {
        let cache = Arc::new(QueryCache::default());
        cache.set_with_ttl("k", result_with_id("k"), Duration::from_millis(1));

        let sweeper = spawn_sweeper(Arc::clone(&cache), Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(cache.size(), 0);
        sweeper.stop();
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(QueryCache::default());
        let mut handles = Vec::new();
        for worker in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("k-{}-{}", worker, i);
                    cache.set(key.clone(), result_with_id(&key));
                    assert!(cache.get(&key).is_some());
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.size(), 800);
    }
}
