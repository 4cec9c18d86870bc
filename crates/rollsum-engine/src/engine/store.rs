use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;

use rollsum_core::{KeyAggregate, MetricEvent, SweepOutcome, Timestamp};

/// One key's aggregate behind its own lock.
pub type SharedAggregate = Arc<Mutex<KeyAggregate>>;

/// A key seen for the first time by [`AggregateStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewKey {
    pub key: String,
    pub generation: u64,
}

/// Aggregate store: `key -> KeyAggregate`.
///
/// Two levels of locking:
/// - the sharded map guards lookup and insertion of keys;
/// - each aggregate's mutex guards its fields.
///
/// Lock order is always map shard, then aggregate. Nothing takes a shard lock
/// while holding an aggregate lock.
#[derive(Default)]
pub struct AggregateStore {
    map: DashMap<String, SharedAggregate>,
    generation: AtomicU64,
}

fn lock(agg: &Mutex<KeyAggregate>) -> MutexGuard<'_, KeyAggregate> {
    // A poisoned aggregate means a sweep tripped its invariant check. The data
    // is still consistent with the last successful mutation, so keep serving.
    agg.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AggregateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, creating the key's aggregate on first sight.
    ///
    /// Only the aggregation worker calls this. The shard guard is held across
    /// the append so idle-key eviction cannot remove the aggregate mid-write.
    pub(crate) fn append(&self, event: MetricEvent, now: Timestamp) -> Option<NewKey> {
        if let Some(agg) = self.map.get(event.key()) {
            lock(agg.value()).append(event);
            return None;
        }

        let key = event.key().to_owned();
        let mut created = None;
        let entry = self.map.entry(key.clone()).or_insert_with(|| {
            let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
            created = Some(NewKey {
                key: key.clone(),
                generation,
            });
            Arc::new(Mutex::new(KeyAggregate::new(key, now, generation)))
        });
        lock(entry.value()).append(event);
        created
    }

    /// Current running sum; 0 for unknown keys.
    pub fn sum(&self, key: &str) -> i64 {
        self.map
            .get(key)
            .map(|agg| lock(agg.value()).running_sum())
            .unwrap_or(0)
    }

    /// Copy of a key's events in arrival order.
    pub fn events(&self, key: &str) -> Vec<MetricEvent> {
        self.map
            .get(key)
            .map(|agg| lock(agg.value()).events().cloned().collect())
            .unwrap_or_default()
    }

    /// Handle to a key's aggregate, if present.
    pub fn get(&self, key: &str) -> Option<SharedAggregate> {
        self.map.get(key).map(|agg| Arc::clone(agg.value()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Sweep one key regardless of generation.
    pub fn sweep(&self, key: &str, now: Timestamp, window: Duration) -> Option<SweepOutcome> {
        let agg = self.get(key)?;
        let mut g = lock(&agg);
        Some(g.sweep(now, window))
    }

    /// Sweep one key only if it is still the incarnation the caller scheduled.
    pub(crate) fn sweep_generation(
        &self,
        key: &str,
        generation: u64,
        now: Timestamp,
        window: Duration,
    ) -> Option<SweepOutcome> {
        let agg = self.get(key)?;
        let mut g = lock(&agg);
        if g.generation() != generation {
            return None;
        }
        Some(g.sweep(now, window))
    }

    /// Remove a key whose aggregate has been empty for at least `grace`.
    pub(crate) fn evict_if_idle(
        &self,
        key: &str,
        generation: u64,
        now: Timestamp,
        grace: Duration,
    ) -> bool {
        self.map
            .remove_if(key, |_, agg| {
                let g = lock(agg);
                g.generation() == generation && g.is_idle_past(now, grace)
            })
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use rollsum_core::WINDOW;

    use super::*;

    fn ev(key: &str, value: i64, at: Timestamp) -> MetricEvent {
        MetricEvent::new(key, value, at).unwrap()
    }

    #[test]
    fn first_append_reports_new_key_once() {
        let store = AggregateStore::new();
        let now = SystemTime::now();

        let first = store.append(ev("logins", 2, now), now);
        let second = store.append(ev("logins", 1, now), now);

        assert_eq!(
            first,
            Some(NewKey {
                key: "logins".into(),
                generation: 1
            })
        );
        assert_eq!(second, None);
        assert_eq!(store.sum("logins"), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_key_sums_to_zero() {
        let store = AggregateStore::new();
        assert_eq!(store.sum("unseen-key"), 0);
        assert!(store.events("unseen-key").is_empty());
        assert!(store.sweep("unseen-key", SystemTime::now(), WINDOW).is_none());
    }

    #[test]
    fn stale_generation_is_not_swept() {
        let store = AggregateStore::new();
        let now = SystemTime::now();
        store.append(ev("k", 1, now - Duration::from_secs(2 * 60 * 60)), now);

        assert!(store.sweep_generation("k", 99, now, WINDOW).is_none());
        assert_eq!(store.sum("k"), 1);

        let out = store.sweep_generation("k", 1, now, WINDOW).unwrap();
        assert_eq!(out.evicted, 1);
        assert_eq!(store.sum("k"), 0);
    }

    #[test]
    fn idle_eviction_requires_grace_and_matching_generation() {
        let store = AggregateStore::new();
        let now = SystemTime::now();
        let grace = Duration::from_secs(60);
        store.append(ev("k", 1, now - Duration::from_secs(2 * 60 * 60)), now);
        store.sweep("k", now, WINDOW);

        assert!(!store.evict_if_idle("k", 1, now, grace));
        assert!(!store.evict_if_idle("k", 2, now + grace, grace));
        assert!(store.evict_if_idle("k", 1, now + grace, grace));
        assert!(!store.contains("k"));

        // recreated key gets a fresh generation
        let again = store.append(ev("k", 4, now + grace), now + grace);
        assert_eq!(again.map(|n| n.generation), Some(2));
        assert_eq!(store.sum("k"), 4);
    }
}
