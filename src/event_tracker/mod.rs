//! EventTracker - per-event recognition attempt bookkeeping
//!
//! ## Responsibilities
//!
//! - Track which events are currently in flight
//! - Count recognition attempts per event id
//! - Clear state on terminal messages or definitive outcomes
//!
//! All operations are O(1) and individually atomic behind one mutex. There
//! is deliberately no cross-operation atomicity: attempts are a soft cap,
//! and the pipeline's own track -> bound-check -> increment sequencing
//! tolerates the benign race between two workers on the same event id.

use std::collections::HashMap;
use std::sync::Mutex;

/// Concurrency-safe attempt counter map keyed by event id.
///
/// Absence of an id means "zero attempts, not tracked".
#[derive(Debug, Default)]
pub struct EventTracker {
    events: Mutex<HashMap<String, u32>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking an event at zero attempts. Idempotent: an existing
    /// count is left untouched.
    pub fn start(&self, event_id: &str) {
        let mut events = self.events.lock().unwrap();
        events.entry(event_id.to_string()).or_insert(0);
    }

    /// Whether the event is currently tracked.
    pub fn is_tracked(&self, event_id: &str) -> bool {
        self.events.lock().unwrap().contains_key(event_id)
    }

    /// Increment the attempt counter and return the new count. Starts
    /// tracking implicitly when the id is absent.
    pub fn increment(&self, event_id: &str) -> u32 {
        let mut events = self.events.lock().unwrap();
        let count = events.entry(event_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Current attempt count; 0 when untracked.
    pub fn attempts(&self, event_id: &str) -> u32 {
        self.events
            .lock()
            .unwrap()
            .get(event_id)
            .copied()
            .unwrap_or(0)
    }

    /// Stop tracking an event. No-op when the id is absent.
    pub fn clear(&self, event_id: &str) {
        self.events.lock().unwrap().remove(event_id);
    }

    /// Number of currently tracked events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_untracked_reads_as_zero() {
        let tracker = EventTracker::new();
        assert!(!tracker.is_tracked("evt-1"));
        assert_eq!(tracker.attempts("evt-1"), 0);
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let tracker = EventTracker::new();
        tracker.start("evt-1");
        tracker.increment("evt-1");
        tracker.start("evt-1");
        assert_eq!(tracker.attempts("evt-1"), 1);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_increment_returns_new_count() {
        let tracker = EventTracker::new();
        tracker.start("evt-1");
        assert_eq!(tracker.increment("evt-1"), 1);
        assert_eq!(tracker.increment("evt-1"), 2);
        assert_eq!(tracker.attempts("evt-1"), 2);
    }

    #[test]
    fn test_clear_is_noop_when_absent() {
        let tracker = EventTracker::new();
        tracker.clear("evt-1");
        tracker.clear("evt-1");
        assert_eq!(tracker.len(), 0);
    }

    #[test]
    fn test_clear_forgets_attempts() {
        let tracker = EventTracker::new();
        tracker.increment("evt-1");
        tracker.clear("evt-1");
        assert!(!tracker.is_tracked("evt-1"));
        assert_eq!(tracker.attempts("evt-1"), 0);
    }

    #[test]
    fn test_len_counts_distinct_events() {
        let tracker = EventTracker::new();
        tracker.start("evt-1");
        tracker.start("evt-2");
        tracker.increment("evt-1");
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn test_concurrent_increments_are_lossless() {
        let tracker = Arc::new(EventTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    tracker.increment("evt-1");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(tracker.attempts("evt-1"), 800);
    }
}
