use std::collections::VecDeque;
use std::time::Duration;

use crate::clock::Timestamp;
use crate::model::MetricEvent;

/// Result of one sweep over a key's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Number of events removed from the front.
    pub evicted: usize,
    /// Sum of the removed values (already subtracted from the running sum).
    pub evicted_sum: i64,
    /// Events still inside the window.
    pub remaining: usize,
}

/// Per-key windowed aggregate.
///
/// Invariants:
/// - `running_sum` equals the (wrapping) sum of `value` over `events`.
/// - `events` is ordered by non-decreasing `occurred_at`.
///
/// The struct itself is not synchronized; the store wraps it in a lock.
#[derive(Debug, Clone)]
pub struct KeyAggregate {
    key: String,
    events: VecDeque<MetricEvent>,
    running_sum: i64,
    window_start: Timestamp,
    empty_since: Option<Timestamp>,
    generation: u64,
}

impl KeyAggregate {
    pub fn new(key: impl Into<String>, now: Timestamp, generation: u64) -> Self {
        Self {
            key: key.into(),
            events: VecDeque::new(),
            running_sum: 0,
            window_start: now,
            empty_since: None,
            generation,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn running_sum(&self) -> i64 {
        self.running_sum
    }

    pub fn window_start(&self) -> Timestamp {
        self.window_start
    }

    /// Identifies this incarnation of the key (bumped when a key is evicted and recreated).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in arrival order.
    pub fn events(&self) -> impl Iterator<Item = &MetricEvent> {
        self.events.iter()
    }

    /// When the last sweep left this aggregate empty (cleared by the next append).
    pub fn empty_since(&self) -> Option<Timestamp> {
        self.empty_since
    }

    /// Append an event at the tail and add its value to the running sum.
    ///
    /// An event stamped earlier than the current tail (two producers racing
    /// between stamping and enqueueing) is recorded at the tail's time.
    pub fn append(&mut self, event: MetricEvent) {
        debug_assert_eq!(event.key(), self.key, "event routed to the wrong aggregate");

        let event = match self.events.back() {
            Some(tail) => event.not_before(tail.occurred_at()),
            None => event,
        };
        self.running_sum = self.running_sum.wrapping_add(event.value());
        self.events.push_back(event);
        self.empty_since = None;
    }

    /// Evict every leading event older than `window` at `now`.
    ///
    /// Stops at the first event still inside the window; ordering guarantees
    /// nothing behind it can be older.
    pub fn sweep(&mut self, now: Timestamp, window: Duration) -> SweepOutcome {
        let mut evicted = 0usize;
        let mut evicted_sum = 0i64;

        while let Some(front) = self.events.front() {
            if !front.is_expired_at(now, window) {
                break;
            }
            evicted_sum = evicted_sum.wrapping_add(front.value());
            evicted += 1;
            self.events.pop_front();
        }

        self.running_sum = self.running_sum.wrapping_sub(evicted_sum);
        self.window_start = now;
        if self.events.is_empty() && self.empty_since.is_none() {
            self.empty_since = Some(now);
        }

        debug_assert_eq!(
            self.running_sum,
            self.recomputed_sum(),
            "running sum drifted from events (key={})",
            self.key
        );

        SweepOutcome {
            evicted,
            evicted_sum,
            remaining: self.events.len(),
        }
    }

    /// Empty for at least `grace` as of `now`.
    pub fn is_idle_past(&self, now: Timestamp, grace: Duration) -> bool {
        match self.empty_since {
            Some(since) if self.events.is_empty() => {
                now.duration_since(since).unwrap_or(Duration::ZERO) >= grace
            }
            _ => false,
        }
    }

    fn recomputed_sum(&self) -> i64 {
        self.events
            .iter()
            .fold(0i64, |acc, e| acc.wrapping_add(e.value()))
    }
}
