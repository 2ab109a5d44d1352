//! Application state
//!
//! Holds the shared components handed to the web layer.

use crate::event_tracker::EventTracker;
use crate::metrics::PipelineStats;
use crate::storage::PlateStore;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Plate history store
    pub store: PlateStore,
    /// Pipeline counters
    pub stats: Arc<PipelineStats>,
    /// In-flight event tracker
    pub tracker: Arc<EventTracker>,
}
