//! Platewatch - license plate recognition service for Frigate NVR events
//!
//! ## Architecture
//!
//! 1. MqttSubscriber - event ingestion into a bounded worker pool
//! 2. EventPipeline - admission, dedup, attempt bounding, orchestration
//! 3. RecognitionClient - two interchangeable recognition backends
//! 4. WatchlistMatcher - three-tier watched-plate resolution
//! 5. EventTracker - per-event attempt bookkeeping
//! 6. PlateStore - SQLite plate history (at-most-once per event)
//! 7. FrigateClient - NVR snapshot/sublabel adapter
//! 8. SnapshotSaver - annotated snapshot persistence
//! 9. WebAPI - health and stats endpoints

pub mod config;
pub mod error;
pub mod event_filters;
pub mod event_model;
pub mod event_tracker;
pub mod frigate;
pub mod messaging;
pub mod metrics;
pub mod pipeline;
pub mod recognition;
pub mod snapshots;
pub mod state;
pub mod storage;
pub mod watchlist;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
