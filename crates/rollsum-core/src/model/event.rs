use std::time::Duration;

use crate::clock::Timestamp;
use crate::error::{Result, RollsumError};

/// A single metric observation.
///
/// Immutable once created. `occurred_at` is the engine's clock reading when the
/// event was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    key: String,
    value: i64,
    occurred_at: Timestamp,
}

impl MetricEvent {
    /// Build an event. The only validation is a non-empty key.
    pub fn new(key: impl Into<String>, value: i64, occurred_at: Timestamp) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(RollsumError::InvalidInput("metric key must not be empty".into()));
        }
        Ok(Self {
            key,
            value,
            occurred_at,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> i64 {
        self.value
    }

    pub fn occurred_at(&self) -> Timestamp {
        self.occurred_at
    }

    /// Age relative to `now`. Events stamped after `now` have age zero.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.duration_since(self.occurred_at).unwrap_or(Duration::ZERO)
    }

    /// Strictly older than `window` at `now`.
    pub fn is_expired_at(&self, now: Timestamp, window: Duration) -> bool {
        self.age_at(now) > window
    }

    /// Same event, stamped no earlier than `floor`.
    pub(crate) fn not_before(self, floor: Timestamp) -> Self {
        if self.occurred_at >= floor {
            return self;
        }
        Self {
            occurred_at: floor,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn empty_key_is_invalid_input() {
        let err = MetricEvent::new("", 1, SystemTime::now()).err();
        assert!(matches!(err, Some(RollsumError::InvalidInput(_))));
    }

    #[test]
    fn expiry_is_strictly_greater_than_window() {
        let now = SystemTime::now();
        let window = Duration::from_secs(60);

        let exact = MetricEvent::new("k", 1, now - window).ok();
        let older = MetricEvent::new("k", 1, now - window - Duration::from_millis(1)).ok();
        assert_eq!(exact.map(|e| e.is_expired_at(now, window)), Some(false));
        assert_eq!(older.map(|e| e.is_expired_at(now, window)), Some(true));
    }

    #[test]
    fn future_events_have_zero_age() {
        let now = SystemTime::now();
        let ev = MetricEvent::new("k", 1, now + Duration::from_secs(5)).ok();
        assert_eq!(ev.map(|e| e.age_at(now)), Some(Duration::ZERO));
    }
}
