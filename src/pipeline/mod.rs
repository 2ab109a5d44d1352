//! EventPipeline - per-message orchestration
//!
//! ## Responsibilities
//!
//! - Admit or reject each inbound event message (filters, dedup, attempt
//!   bound)
//! - Drive snapshot fetch, recognition, watch-list resolution
//! - Persist at most one plate per event and dispatch side effects
//!
//! One invocation produces exactly one [`Outcome`]. Internal failures are
//! caught at the boundary and reported as `Outcome::Error`; nothing
//! escapes to the worker pool.

use crate::config::FrigateConfig;
use crate::error::Result;
use crate::event_filters;
use crate::event_model::EventMessage;
use crate::event_tracker::EventTracker;
use crate::frigate::FrigateApi;
use crate::messaging::{OutboundPlate, PlatePublisher};
use crate::metrics::PipelineStats;
use crate::recognition::RecognitionClient;
use crate::snapshots::SnapshotSink;
use crate::storage::{InsertOutcome, PlateStore};
use chrono::{Local, TimeZone};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Terminal outcome of one pipeline traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    FirstMessage,
    InvalidEvent,
    DuplicateEvent,
    InvalidLicensePlate,
    NoSnapshot,
    MaxAttempts,
    NoPlate,
    Success,
    DbError,
    Error,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::FirstMessage => "first_message",
            Outcome::InvalidEvent => "invalid_event",
            Outcome::DuplicateEvent => "duplicate_event",
            Outcome::InvalidLicensePlate => "invalid_license_plate",
            Outcome::NoSnapshot => "no_snapshot",
            Outcome::MaxAttempts => "max_attempts",
            Outcome::NoPlate => "no_plate",
            Outcome::Success => "success",
            Outcome::DbError => "db_error",
            Outcome::Error => "error",
        }
    }
}

pub struct EventPipeline {
    config: FrigateConfig,
    tracker: Arc<EventTracker>,
    store: PlateStore,
    recognizer: RecognitionClient,
    frigate: Arc<dyn FrigateApi>,
    publisher: Arc<dyn PlatePublisher>,
    snapshots: Arc<dyn SnapshotSink>,
    stats: Arc<PipelineStats>,
    /// Boot-time guard: the transport's retained/last-will semantics can
    /// replay a stale delivery on connect, so the very first message since
    /// process start is always discarded.
    first_message: AtomicBool,
}

impl EventPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: FrigateConfig,
        tracker: Arc<EventTracker>,
        store: PlateStore,
        recognizer: RecognitionClient,
        frigate: Arc<dyn FrigateApi>,
        publisher: Arc<dyn PlatePublisher>,
        snapshots: Arc<dyn SnapshotSink>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            config,
            tracker,
            store,
            recognizer,
            frigate,
            publisher,
            snapshots,
            stats,
            first_message: AtomicBool::new(true),
        }
    }

    /// Process one inbound event message to a terminal outcome.
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        match self.process_inner(payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Unhandled error while processing event message");
                Outcome::Error
            }
        }
    }

    async fn process_inner(&self, payload: &[u8]) -> Result<Outcome> {
        if self.first_message.swap(false, Ordering::SeqCst) {
            tracing::debug!("Skipping first message");
            return Ok(Outcome::FirstMessage);
        }

        let message = EventMessage::parse(payload)?;
        let event_id = message.after.id.clone();
        tracing::debug!(event_id = %event_id, kind = ?message.kind, "Event message received");

        if message.kind.is_terminal() && self.tracker.is_tracked(&event_id) {
            tracing::debug!(
                event_id = %event_id,
                attempts = self.tracker.attempts(&event_id),
                "Clearing event after terminal message"
            );
            self.tracker.clear(&event_id);
        }

        if event_filters::check_invalid_event(
            &self.config,
            &message.before,
            &message.after,
            self.tracker.is_tracked(&event_id),
        ) {
            return Ok(Outcome::InvalidEvent);
        }

        if self.store.has_processed(&event_id).await? {
            return Ok(Outcome::DuplicateEvent);
        }

        if self.config.frigate_plus
            && !event_filters::is_valid_license_plate(&self.config, &message.after)
        {
            return Ok(Outcome::InvalidLicensePlate);
        }

        if !message.kind.is_terminal() && !self.tracker.is_tracked(&event_id) {
            self.tracker.start(&event_id);
        }

        let snapshot = if message.after.has_snapshot {
            self.frigate.fetch_snapshot(&event_id, true).await
        } else {
            None
        };
        let Some(snapshot) = snapshot else {
            tracing::debug!(event_id = %event_id, "Event has no snapshot");
            self.tracker.clear(&event_id);
            return Ok(Outcome::NoSnapshot);
        };

        tracing::debug!(event_id = %event_id, "Getting plate for event");

        let max_attempts = self.config.max_attempts;
        if max_attempts > 0 && self.tracker.attempts(&event_id) >= max_attempts {
            tracing::debug!(
                event_id = %event_id,
                attempts = self.tracker.attempts(&event_id),
                "Maximum number of recognition attempts reached"
            );
            return Ok(Outcome::MaxAttempts);
        }

        let attempt = self.tracker.increment(&event_id);
        tracing::debug!(event_id = %event_id, attempt, "Recognition attempt");

        let lookup = self.recognizer.recognize(&snapshot).await;

        let mut result = Outcome::NoPlate;
        let saved_plate_number = lookup
            .watched_plate
            .clone()
            .or_else(|| lookup.plate_number.clone());

        if let Some(ref plate_number) = lookup.plate_number {
            let formatted_start_time = format_start_time(message.after.start_time);
            // saved_plate_number is Some whenever plate_number is.
            let saved = saved_plate_number.clone().unwrap_or_default();

            tracing::info!(
                plate = %saved,
                score = ?lookup.plate_score,
                "Storing plate number in database"
            );
            result = match self
                .store
                .insert_plate(
                    &formatted_start_time,
                    lookup.plate_score,
                    &saved,
                    &event_id,
                    &message.after.camera,
                )
                .await
            {
                Ok(InsertOutcome::Inserted) => {
                    self.stats.record_db_write();
                    Outcome::Success
                }
                Ok(InsertOutcome::AlreadyExists) => Outcome::DuplicateEvent,
                Err(e) => {
                    tracing::error!(event_id = %event_id, error = %e, "Failed to store plate");
                    self.stats.record_db_error();
                    Outcome::DbError
                }
            };

            self.frigate
                .set_sublabel(&event_id, &saved, lookup.plate_score)
                .await;

            self.publisher
                .publish_plate(OutboundPlate {
                    plate_number: Some(plate_number.clone()),
                    plate_score: lookup.plate_score,
                    event_id: event_id.clone(),
                    camera_name: message.after.camera.clone(),
                    formatted_start_time,
                    watched_plate: lookup.watched_plate.clone(),
                    fuzzy_score: lookup.fuzzy_score,
                })
                .await;
        }

        if saved_plate_number.is_some() || self.config.always_save_snapshot {
            self.snapshots
                .save(&message.after, saved_plate_number.as_deref())
                .await;
        }

        Ok(result)
    }
}

/// Format the event's unix start timestamp for persistence and publishing.
fn format_start_time(start_time: f64) -> String {
    let timestamp = Local
        .timestamp_opt(start_time as i64, 0)
        .single()
        .unwrap_or_else(Local::now);
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}
