//! Divergence and fallback tracking
//!
//! The two stores are allowed to drift apart: a failed mirror write is
//! swallowed and a failed primary read is answered from the other store.
//! Nothing reconciles them afterwards, so this module makes the drift
//! visible instead.
//!
//! Every mirror failure is
//! - counted,
//! - kept in a bounded ring of recent [`DivergenceEvent`]s,
//! - emitted as a `warn` event on the `devprep::divergence` tracing target.
//!
//! Fallback reads are counted.
//!
//! # Example
//!
//! ```
//! use devprep_store::events::StoreEvents;
//!
//! let events = StoreEvents::new();
//! events.record_divergence("sign_up", "redis", "network error");
//! events.record_fallback("get_topics", "postgres");
//!
//! let snapshot = events.snapshot();
//! assert_eq!(snapshot.mirror_failures, 1);
//! assert_eq!(snapshot.fallbacks, 1);
//! assert_eq!(snapshot.recent[0].backend, "redis");
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Recent divergence events kept in memory
pub const MAX_RECENT_EVENTS: usize = 100;

/// A mirror write that failed after the primary succeeded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DivergenceEvent {
    /// Logical operation name
    pub operation: String,

    /// Store that missed the write
    pub backend: String,

    pub error: String,

    pub occurred_at: DateTime<Utc>,
}

/// Point-in-time view of [`StoreEvents`]
#[derive(Debug, Clone, Serialize)]
pub struct StoreEventsSnapshot {
    pub fallbacks: u64,
    pub mirror_failures: u64,

    /// Newest first
    pub recent: Vec<DivergenceEvent>,
}

/// Shared counters and recent events
#[derive(Debug, Default)]
pub struct StoreEvents {
    fallbacks: AtomicU64,
    mirror_failures: AtomicU64,
    recent: Mutex<VecDeque<DivergenceEvent>>,
}

impl StoreEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a read answered by the fallback store
    pub fn record_fallback(&self, operation: &str, failed_backend: &str) {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            operation = %operation,
            backend = %failed_backend,
            "Fallback read recorded"
        );
    }

    /// Records a swallowed mirror failure
    pub fn record_divergence(&self, operation: &str, backend: &str, error: &str) {
        self.mirror_failures.fetch_add(1, Ordering::SeqCst);

        tracing::warn!(
            target: "devprep::divergence",
            operation = %operation,
            backend = %backend,
            error = %error,
            "Mirror write failed, stores have diverged"
        );

        let event = DivergenceEvent {
            operation: operation.to_string(),
            backend: backend.to_string(),
            error: error.to_string(),
            occurred_at: Utc::now(),
        };

        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.len() == MAX_RECENT_EVENTS {
            recent.pop_back();
        }
        recent.push_front(event);
    }

    pub fn fallbacks(&self) -> u64 {
        self.fallbacks.load(Ordering::SeqCst)
    }

    pub fn mirror_failures(&self) -> u64 {
        self.mirror_failures.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StoreEventsSnapshot {
        let recent = self
            .recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();

        StoreEventsSnapshot {
            fallbacks: self.fallbacks(),
            mirror_failures: self.mirror_failures(),
            recent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let events = StoreEvents::new();
        assert_eq!(events.fallbacks(), 0);
        assert_eq!(events.mirror_failures(), 0);
        assert!(events.snapshot().recent.is_empty());
    }

    #[test]
    fn test_recent_events_are_bounded_and_newest_first() {
        let events = StoreEvents::new();

        for i in 0..(MAX_RECENT_EVENTS + 10) {
            events.record_divergence(&format!("op{}", i), "redis", "timeout");
        }

        let snapshot = events.snapshot();
        assert_eq!(snapshot.recent.len(), MAX_RECENT_EVENTS);
        assert_eq!(snapshot.mirror_failures, (MAX_RECENT_EVENTS + 10) as u64);
        assert_eq!(snapshot.recent[0].operation, format!("op{}", MAX_RECENT_EVENTS + 9));
    }

    #[test]
    fn test_snapshot_serializes() {
        let events = StoreEvents::new();
        events.record_divergence("save_quiz_result", "postgres", "connection refused");

        let json = serde_json::to_value(events.snapshot()).unwrap();
        assert_eq!(json["mirror_failures"], 1);
        assert_eq!(json["recent"][0]["operation"], "save_quiz_result");
    }
}
