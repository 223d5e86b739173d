//! TTL + capacity bounded cache for pre-analysis reports

use crate::config::ScoutSettings;
use crate::scout::types::ScoutReport;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Share of capacity evicted when the cache overflows.
const EVICTION_SHARE: usize = 5;

/// Counters describing cache behaviour since startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed (absent or expired)
    pub misses: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed because their TTL elapsed
    pub expirations: u64,
    /// Entries currently stored
    pub entries: usize,
}

struct CacheEntry {
    report: ScoutReport,
    stored_at: Instant,
}

/// Concurrent cache of analysis reports keyed by request content hash.
///
/// Expired entries are dropped lazily on lookup and eagerly by the
/// background sweeper. On overflow the oldest fifth of the entries is
/// evicted to make room.
pub struct AnalysisCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl AnalysisCache {
    /// Create a cache with the given TTL and capacity.
    #[must_use]
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Create a cache from the scout configuration section.
    #[must_use]
    pub fn from_settings(settings: &ScoutSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.cache_ttl_secs),
            settings.cache_capacity,
        )
    }

    /// Look up a report. Expired entries count as misses and are removed.
    pub fn get(&self, key: &str) -> Option<ScoutReport> {
        if let Some(entry) = self.entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.report.clone());
            }
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        // Present but expired: drop it outside the read guard
        self.entries.remove(key);
        self.expirations.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a report, evicting the oldest entries on overflow.
    pub fn insert(&self, key: String, report: ScoutReport) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                report,
                stored_at: Instant::now(),
            },
        );
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Snapshot of the cache counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn evict_oldest(&self) {
        let mut ages: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stored_at))
            .collect();
        ages.sort_by_key(|(_, stored_at)| *stored_at);

        let to_evict = (self.capacity / EVICTION_SHARE).max(1);
        for (key, _) in ages.into_iter().take(to_evict) {
            self.entries.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        debug!(evicted = to_evict, "scout cache evicted oldest entries");
    }
}

/// Spawn the periodic sweeper. Runs until the token is cancelled.
pub fn spawn_sweeper(
    cache: Arc<AnalysisCache>,
    interval: Duration,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    if removed > 0 {
                        debug!(removed, "scout cache sweep removed expired entries");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::types::{DependencyImpact, RiskLevel, RiskSummary, ScoutReport};

    fn report(operation: &str) -> ScoutReport {
        ScoutReport {
            operation: operation.to_string(),
            duplications: Vec::new(),
            dependency_impact: DependencyImpact {
                affected_files: Vec::new(),
                breaking_changes: Vec::new(),
                risk: RiskLevel::Low,
                effort_estimate: "a few hours".to_string(),
            },
            tech_debt: Vec::new(),
            should_proceed: true,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            confidence: 0.5,
            risk_summary: RiskSummary {
                overall: RiskLevel::Low,
                duplication_count: 0,
                highest_similarity: 0.0,
                breaking_change_count: 0,
                debt_count: 0,
                headline: String::new(),
            },
            cache_hit: false,
            generated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_hit_and_miss_counters() {
        let cache = AnalysisCache::new(Duration::from_secs(60), 10);
        assert!(cache.get("absent").is_none());

        cache.insert("key".to_string(), report("op"));
        assert!(cache.get("key").is_some());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = AnalysisCache::new(Duration::from_millis(0), 10);
        cache.insert("key".to_string(), report("op"));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get("key").is_none());
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entries, 0);
    }

    #[test]
    fn test_overflow_evicts_oldest_fifth() {
        let cache = AnalysisCache::new(Duration::from_secs(60), 10);
        for i in 0..10 {
            cache.insert(format!("key-{i}"), report("op"));
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(cache.len(), 10);

        cache.insert("key-10".to_string(), report("op"));

        // Two oldest evicted (a fifth of capacity), newcomer stored
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.stats().evictions, 2);
        assert!(cache.get("key-0").is_none());
        assert!(cache.get("key-1").is_none());
        assert!(cache.get("key-10").is_some());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = AnalysisCache::new(Duration::from_millis(30), 10);
        cache.insert("old".to_string(), report("op"));
        std::thread::sleep(Duration::from_millis(40));
        cache.insert("fresh".to_string(), report("op"));

        let removed = cache.sweep();
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("fresh").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_cancellation() {
        let cache = Arc::new(AnalysisCache::new(Duration::from_secs(60), 10));
        let token = CancellationToken::new();
        let handle = spawn_sweeper(cache, Duration::from_millis(10), token.clone());

        token.cancel();
        handle.await.unwrap();
    }
}
