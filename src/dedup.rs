//! Per-fingerprint deduplication gate
//!
//! Alertmanager re-delivers the same alert on every group interval. The
//! deduplicator keeps a high-water mark per fingerprint and only lets a
//! delivery through when its timestamp is strictly newer than anything
//! accepted before for that key.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Bounds for the fingerprint map
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Maximum tracked keys; the longest-ago accepted key is evicted beyond this
    pub max_entries: usize,

    /// Forget keys whose last acceptance is older than this (disabled when `None`)
    pub ttl: Option<Duration>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            ttl: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    timestamp: DateTime<Utc>,
    accepted_at: Instant,
    seq: u64,
}

/// Fingerprint marks plus their acceptance order
///
/// `order` maps an increasing acceptance sequence to its key, so the entry
/// accepted longest ago is always the first one.
#[derive(Default)]
struct Marks {
    by_key: HashMap<String, Mark>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Marks {
    fn accept(&mut self, key: &str, timestamp: DateTime<Utc>, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let mark = Mark {
            timestamp,
            accepted_at: now,
            seq,
        };
        if let Some(previous) = self.by_key.insert(key.to_string(), mark) {
            self.order.remove(&previous.seq);
        }
        self.order.insert(seq, key.to_string());
    }

    /// Remove and return the key accepted longest ago
    fn pop_oldest(&mut self) -> Option<(String, Mark)> {
        let (_, key) = self.order.pop_first()?;
        let mark = self.by_key.remove(&key)?;
        Some((key, mark))
    }

    fn oldest(&self) -> Option<&Mark> {
        let (_, key) = self.order.first_key_value()?;
        self.by_key.get(key)
    }
}

/// Monotonic-timestamp gate keyed by fingerprint
///
/// A single mutex guards the map and is held only for the compare-and-swap,
/// so after any set of concurrent calls the stored value is the maximum
/// timestamp submitted for that key. Eviction pops from an acceptance-order
/// index and costs O(log n) per removed key.
pub struct Deduplicator {
    marks: Mutex<Marks>,
    config: DedupConfig,
}

impl Deduplicator {
    /// Create a deduplicator with the given bounds
    pub fn new(config: DedupConfig) -> Self {
        Self {
            marks: Mutex::new(Marks::default()),
            config,
        }
    }

    /// Record `timestamp` for `key` if it is strictly newer than the stored mark
    ///
    /// The first call for a key always succeeds, including with the zero timestamp.
    pub fn is_newer(&self, key: &str, timestamp: DateTime<Utc>) -> bool {
        let now = Instant::now();
        let mut marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(mark) = marks.by_key.get(key) {
            if !self.is_expired(mark, now) && timestamp <= mark.timestamp {
                return false;
            }
        }

        marks.accept(key, timestamp, now);
        self.evict(&mut marks, now);
        true
    }

    /// Last accepted timestamp for `key`
    pub fn last_seen(&self, key: &str) -> Option<DateTime<Utc>> {
        let marks = self.marks.lock().unwrap_or_else(PoisonError::into_inner);
        marks
            .by_key
            .get(key)
            .filter(|m| !self.is_expired(m, Instant::now()))
            .map(|m| m.timestamp)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.marks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .len()
    }

    /// True when no key is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, mark: &Mark, now: Instant) -> bool {
        match self.config.ttl {
            Some(ttl) => now.duration_since(mark.accepted_at) > ttl,
            None => false,
        }
    }

    fn evict(&self, marks: &mut Marks, now: Instant) {
        // Acceptance order is also expiry order
        while marks.oldest().is_some_and(|m| self.is_expired(m, now)) {
            marks.pop_oldest();
        }

        while marks.by_key.len() > self.config.max_entries {
            match marks.pop_oldest() {
                Some((key, _)) => tracing::debug!(fingerprint = %key, "Evicting dedup entry"),
                None => break,
            }
        }
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DedupConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_first_seen_accepts_any_timestamp() {
        let dedup = Deduplicator::default();
        assert!(dedup.is_newer("fp-a", DateTime::<Utc>::default()));
        assert!(dedup.is_newer("fp-b", ts(1_700_000_000)));
    }

    #[test]
    fn test_same_or_earlier_rejected_later_accepted() {
        let dedup = Deduplicator::default();
        assert!(dedup.is_newer("fp", ts(100)));
        assert!(!dedup.is_newer("fp", ts(100)));
        assert!(!dedup.is_newer("fp", ts(99)));
        assert_eq!(dedup.last_seen("fp"), Some(ts(100)));

        assert!(dedup.is_newer("fp", ts(101)));
        assert_eq!(dedup.last_seen("fp"), Some(ts(101)));
    }

    #[test]
    fn test_zero_timestamp_only_first_time() {
        let dedup = Deduplicator::default();
        let zero = DateTime::<Utc>::default();
        assert!(dedup.is_newer("fp", zero));
        assert!(!dedup.is_newer("fp", zero));
    }

    #[test]
    fn test_keys_are_isolated() {
        let dedup = Deduplicator::default();
        assert!(dedup.is_newer("a", ts(500)));
        assert!(dedup.is_newer("b", ts(10)));
        assert!(!dedup.is_newer("a", ts(10)));
        assert_eq!(dedup.last_seen("b"), Some(ts(10)));
    }

    #[test]
    fn test_concurrent_updates_converge_to_max() {
        let dedup = Arc::new(Deduplicator::default());
        let handles: Vec<_> = (0..1000)
            .map(|i| {
                let dedup = dedup.clone();
                // Interleave ascending and descending submissions
                let secs = if i % 2 == 0 { i } else { 1000 - i };
                std::thread::spawn(move || {
                    dedup.is_newer("shared", ts(secs));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(dedup.last_seen("shared"), Some(ts(999)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_distinct_keys_do_not_interfere() {
        let dedup = Arc::new(Deduplicator::default());
        let mut tasks = Vec::new();
        for i in 0..200 {
            let dedup = dedup.clone();
            tasks.push(tokio::spawn(async move {
                let key = format!("fp-{}", i);
                assert!(dedup.is_newer(&key, ts(i)));
                assert!(!dedup.is_newer(&key, ts(i)));
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(dedup.len(), 200);
    }

    #[test]
    fn test_capacity_evicts_oldest_acceptance() {
        let dedup = Deduplicator::new(DedupConfig {
            max_entries: 2,
            ttl: None,
        });
        assert!(dedup.is_newer("a", ts(1)));
        assert!(dedup.is_newer("b", ts(1)));
        assert!(dedup.is_newer("c", ts(1)));

        assert_eq!(dedup.len(), 2);
        assert!(dedup.last_seen("a").is_none());
        // An evicted key counts as first seen again
        assert!(dedup.is_newer("a", ts(1)));
    }

    #[test]
    fn test_reacceptance_refreshes_eviction_order() {
        let dedup = Deduplicator::new(DedupConfig {
            max_entries: 2,
            ttl: None,
        });
        assert!(dedup.is_newer("a", ts(1)));
        assert!(dedup.is_newer("b", ts(1)));
        assert!(dedup.is_newer("a", ts(2)));
        assert!(dedup.is_newer("c", ts(1)));

        assert!(dedup.last_seen("b").is_none());
        assert_eq!(dedup.last_seen("a"), Some(ts(2)));
        assert_eq!(dedup.last_seen("c"), Some(ts(1)));
    }

    #[test]
    fn test_full_map_stays_bounded() {
        let capacity = 1_000;
        let dedup = Deduplicator::new(DedupConfig {
            max_entries: capacity,
            ttl: None,
        });

        for i in 0..capacity * 5 {
            assert!(dedup.is_newer(&format!("fp-{}", i), ts(i as i64)));
        }

        assert_eq!(dedup.len(), capacity);
        assert!(dedup.last_seen("fp-0").is_none());
        assert!(dedup.last_seen(&format!("fp-{}", capacity * 4 - 1)).is_none());
        assert_eq!(
            dedup.last_seen(&format!("fp-{}", capacity * 4)),
            Some(ts((capacity * 4) as i64))
        );

        let marks = dedup.marks.lock().unwrap();
        assert_eq!(marks.order.len(), capacity);
    }

    #[test]
    fn test_ttl_expiry_treats_key_as_absent() {
        let dedup = Deduplicator::new(DedupConfig {
            max_entries: 10,
            ttl: Some(Duration::from_millis(5)),
        });
        assert!(dedup.is_newer("fp", ts(100)));
        assert!(!dedup.is_newer("fp", ts(100)));
        std::thread::sleep(Duration::from_millis(20));
        assert!(dedup.last_seen("fp").is_none());
        assert!(dedup.is_newer("fp", ts(100)));
    }
}
