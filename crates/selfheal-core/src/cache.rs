//! Healing Cache + Flakiness Tracker (spec §3 invariants, §4.1).
//!
//! Process-local, owned by a single Healer instance — no cross-instance sharing, no
//! TTL beyond explicit invalidation. Generalizes `DefaultSelfHealer`'s
//! `Arc<Mutex<HashSet<String>>>` one-time-heal tracking
//! (`crates/action-locator/src/healer.rs`) into keyed entries carrying confidence,
//! strategy, and use-count.

use std::collections::HashMap;

use chrono::Utc;

use crate::types::{CacheEntry, FlakinessEntry, FlakinessStat, Selector, StrategyTag};

#[derive(Debug, Default)]
pub struct HealingCache {
    entries: HashMap<Selector, CacheEntry>,
    hit_count: u64,
}

impl HealingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, broken_selector: &str) -> Option<&CacheEntry> {
        self.entries.get(broken_selector)
    }

    /// Record a successful heal, keyed by the original broken selector. Per the
    /// invariant in spec §3, callers must only insert after a successful driver
    /// probe of `healed_selector`.
    pub fn insert(
        &mut self,
        broken_selector: impl Into<Selector>,
        healed_selector: impl Into<Selector>,
        confidence: f64,
        strategy: StrategyTag,
    ) {
        self.entries.insert(
            broken_selector.into(),
            CacheEntry {
                healed_selector: healed_selector.into(),
                confidence,
                strategy,
                created_at: Utc::now(),
                use_count: 0,
            },
        );
    }

    /// Increment the use-count of an existing entry, and the cache's cumulative
    /// hit count, on cache hit.
    pub fn mark_used(&mut self, broken_selector: &str) {
        if let Some(entry) = self.entries.get_mut(broken_selector) {
            entry.use_count += 1;
            self.hit_count += 1;
        }
    }

    /// Cumulative number of cache hits served since construction or last `clear`.
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    /// Evict an entry whose healed selector failed revalidation.
    pub fn evict(&mut self, broken_selector: &str) {
        self.entries.remove(broken_selector);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hit_count = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct FlakinessTracker {
    entries: HashMap<Selector, FlakinessEntry>,
}

impl FlakinessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, selector: impl Into<Selector>) {
        self.entries.entry(selector.into()).or_default().successes += 1;
    }

    pub fn record_failure(&mut self, selector: impl Into<Selector>) {
        self.entries.entry(selector.into()).or_default().failures += 1;
    }

    /// Selectors with a nonzero flakiness score, descending.
    pub fn stats(&self) -> Vec<FlakinessStat> {
        let mut out: Vec<FlakinessStat> = self
            .entries
            .iter()
            .map(|(selector, entry)| FlakinessStat {
                selector: selector.clone(),
                successes: entry.successes,
                failures: entry.failures,
                score: entry.score(),
            })
            .filter(|stat| stat.score > 0.0)
            .collect();
        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        out
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_round_trips_an_entry() {
        let mut cache = HealingCache::new();
        cache.insert("#old", "[data-testid=\"x\"]", 0.95, StrategyTag::TestIdRecovery);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("#old").unwrap().healed_selector, "[data-testid=\"x\"]");
    }

    #[test]
    fn evict_removes_entry() {
        let mut cache = HealingCache::new();
        cache.insert("#old", "#new", 0.9, StrategyTag::CssHierarchy);
        cache.evict("#old");
        assert!(cache.get("#old").is_none());
    }

    #[test]
    fn clear_resets_cache() {
        let mut cache = HealingCache::new();
        cache.insert("#old", "#new", 0.9, StrategyTag::CssHierarchy);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn mark_used_increments_entry_and_cumulative_hit_count() {
        let mut cache = HealingCache::new();
        cache.insert("#old", "#new", 0.9, StrategyTag::CssHierarchy);
        cache.mark_used("#old");
        cache.mark_used("#old");
        assert_eq!(cache.get("#old").unwrap().use_count, 2);
        assert_eq!(cache.hit_count(), 2);

        cache.clear();
        assert_eq!(cache.hit_count(), 0);
    }

    #[test]
    fn flakiness_stats_are_sorted_descending_and_exclude_zero_score() {
        let mut tracker = FlakinessTracker::new();
        tracker.record_success("#stable");
        tracker.record_success("#flaky");
        tracker.record_failure("#flaky");
        tracker.record_failure("#very-flaky");

        let stats = tracker.stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].selector, "#very-flaky");
        assert_eq!(stats[0].score, 1.0);
        assert_eq!(stats[1].selector, "#flaky");
        assert_eq!(stats[1].score, 0.5);
    }
}
