//! Window bookkeeping over longer event sequences.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::{Duration, SystemTime};

use rollsum_core::{KeyAggregate, MetricEvent, WINDOW};

/// Deterministic spread of (minutes ago, value) pairs, oldest first.
fn history() -> Vec<(u64, i64)> {
    (0..48u64)
        .map(|i| (150 - i * 3, (i as i64 * 37) % 23 - 11))
        .collect()
}

#[test]
fn sweep_keeps_exactly_the_values_inside_the_window() {
    let now = SystemTime::now();
    let mut agg = KeyAggregate::new("cpu", now, 1);

    for (mins_ago, value) in history() {
        let at = now - Duration::from_secs(mins_ago * 60);
        agg.append(MetricEvent::new("cpu", value, at).unwrap());
    }
    let total: i64 = history().iter().map(|(_, v)| v).sum();
    assert_eq!(agg.running_sum(), total);

    let out = agg.sweep(now, WINDOW);

    let expected: i64 = history()
        .iter()
        .filter(|(mins_ago, _)| Duration::from_secs(mins_ago * 60) <= WINDOW)
        .map(|(_, v)| v)
        .sum();
    assert_eq!(agg.running_sum(), expected);
    assert_eq!(out.evicted_sum, total - expected);
    assert!(agg.events().all(|e| !e.is_expired_at(now, WINDOW)));
}

#[test]
fn repeated_sweeps_track_a_moving_window() {
    let start = SystemTime::now();
    let mut agg = KeyAggregate::new("cpu", start, 1);
    for (mins_ago, value) in history() {
        let at = start - Duration::from_secs(mins_ago * 60);
        agg.append(MetricEvent::new("cpu", value, at).unwrap());
    }

    // advance in 10-minute steps; each sweep only ever removes from the front
    for step in 0..20u64 {
        let now = start + Duration::from_secs(step * 600);
        let before: Vec<SystemTime> = agg.events().map(|e| e.occurred_at()).collect();
        let out = agg.sweep(now, WINDOW);
        let after: Vec<SystemTime> = agg.events().map(|e| e.occurred_at()).collect();

        assert_eq!(&before[out.evicted..], &after[..]);
        let recomputed: i64 = agg.events().map(|e| e.value()).sum();
        assert_eq!(agg.running_sum(), recomputed);
    }
    assert!(agg.is_empty());
    assert_eq!(agg.running_sum(), 0);
}
