//! PipelineStats - in-process pipeline counters
//!
//! ## Responsibilities
//!
//! - Count processed events per outcome
//! - Count recognition calls/errors, DB writes/errors, MQTT publishes
//! - Provide a serializable snapshot for the stats endpoint

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter set shared across workers.
#[derive(Debug, Default)]
pub struct PipelineStats {
    first_message: AtomicU64,
    invalid_event: AtomicU64,
    duplicate_event: AtomicU64,
    invalid_license_plate: AtomicU64,
    no_snapshot: AtomicU64,
    max_attempts: AtomicU64,
    no_plate: AtomicU64,
    success: AtomicU64,
    db_error: AtomicU64,
    error: AtomicU64,

    recognizer_calls: AtomicU64,
    recognizer_errors: AtomicU64,
    db_writes: AtomicU64,
    db_errors: AtomicU64,
    publishes: AtomicU64,
    publishes_watched: AtomicU64,
    snapshots_saved: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub first_message: u64,
    pub invalid_event: u64,
    pub duplicate_event: u64,
    pub invalid_license_plate: u64,
    pub no_snapshot: u64,
    pub max_attempts: u64,
    pub no_plate: u64,
    pub success: u64,
    pub db_error: u64,
    pub error: u64,
    pub recognizer_calls: u64,
    pub recognizer_errors: u64,
    pub db_writes: u64,
    pub db_errors: u64,
    pub publishes: u64,
    pub publishes_watched: u64,
    pub snapshots_saved: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one terminal pipeline outcome by its wire name.
    pub fn record_outcome(&self, outcome: &str) {
        let counter = match outcome {
            "first_message" => &self.first_message,
            "invalid_event" => &self.invalid_event,
            "duplicate_event" => &self.duplicate_event,
            "invalid_license_plate" => &self.invalid_license_plate,
            "no_snapshot" => &self.no_snapshot,
            "max_attempts" => &self.max_attempts,
            "no_plate" => &self.no_plate,
            "success" => &self.success,
            "db_error" => &self.db_error,
            _ => &self.error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recognizer_call(&self) {
        self.recognizer_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recognizer_error(&self) {
        self.recognizer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_write(&self) {
        self.db_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_db_error(&self) {
        self.db_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self, watched: bool) {
        self.publishes.fetch_add(1, Ordering::Relaxed);
        if watched {
            self.publishes_watched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_snapshot_saved(&self) {
        self.snapshots_saved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            first_message: self.first_message.load(Ordering::Relaxed),
            invalid_event: self.invalid_event.load(Ordering::Relaxed),
            duplicate_event: self.duplicate_event.load(Ordering::Relaxed),
            invalid_license_plate: self.invalid_license_plate.load(Ordering::Relaxed),
            no_snapshot: self.no_snapshot.load(Ordering::Relaxed),
            max_attempts: self.max_attempts.load(Ordering::Relaxed),
            no_plate: self.no_plate.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            db_error: self.db_error.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            recognizer_calls: self.recognizer_calls.load(Ordering::Relaxed),
            recognizer_errors: self.recognizer_errors.load(Ordering::Relaxed),
            db_writes: self.db_writes.load(Ordering::Relaxed),
            db_errors: self.db_errors.load(Ordering::Relaxed),
            publishes: self.publishes.load(Ordering::Relaxed),
            publishes_watched: self.publishes_watched.load(Ordering::Relaxed),
            snapshots_saved: self.snapshots_saved.load(Ordering::Relaxed),
        }
    }
}
