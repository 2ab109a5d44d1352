//! MQTT messaging - event subscription and plate publishing
//!
//! ## Responsibilities
//!
//! - Subscribe to `{main_topic}/events` and hand each payload to the
//!   bounded worker pool
//! - Publish recognition outcomes to `{main_topic}/{return_topic}`
//!
//! Reconnection is owned by the rumqttc event loop; connection state
//! transitions are logged here.

use crate::config::FrigateConfig;
use crate::metrics::PipelineStats;
use crate::pipeline::EventPipeline;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const MQTT_CLIENT_ID: &str = "platewatch";
const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);

/// Outbound recognition outcome for one event.
#[derive(Debug, Clone)]
pub struct OutboundPlate {
    pub plate_number: Option<String>,
    pub plate_score: Option<f64>,
    pub event_id: String,
    pub camera_name: String,
    pub formatted_start_time: String,
    pub watched_plate: Option<String>,
    pub fuzzy_score: Option<f64>,
}

/// Downstream publisher consumed by the pipeline.
#[async_trait]
pub trait PlatePublisher: Send + Sync {
    async fn publish_plate(&self, plate: OutboundPlate);
}

/// Build the outbound JSON payload. Watched overrides replace the plate
/// number and carry the original reading alongside.
pub fn build_plate_payload(plate: &OutboundPlate) -> serde_json::Value {
    match plate.watched_plate {
        Some(ref watched) => json!({
            "plate_number": watched.to_uppercase(),
            "score": plate.plate_score,
            "frigate_event_id": plate.event_id,
            "camera_name": plate.camera_name,
            "start_time": plate.formatted_start_time,
            "fuzzy_score": plate.fuzzy_score,
            "original_plate": plate.plate_number.as_deref().map(str::to_uppercase),
            "is_watched_plate": true,
        }),
        None => json!({
            "plate_number": plate.plate_number.as_deref().map(str::to_uppercase),
            "score": plate.plate_score,
            "frigate_event_id": plate.event_id,
            "camera_name": plate.camera_name,
            "start_time": plate.formatted_start_time,
            "is_watched_plate": false,
        }),
    }
}

/// MQTT-backed publisher. Publishing is disabled entirely when no return
/// topic is configured.
pub struct MqttPublisher {
    client: AsyncClient,
    topic: Option<String>,
    stats: Arc<PipelineStats>,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, config: &FrigateConfig, stats: Arc<PipelineStats>) -> Self {
        let topic = config
            .return_topic
            .as_ref()
            .map(|return_topic| format!("{}/{}", config.main_topic, return_topic));
        Self {
            client,
            topic,
            stats,
        }
    }
}

#[async_trait]
impl PlatePublisher for MqttPublisher {
    async fn publish_plate(&self, plate: OutboundPlate) {
        let Some(ref topic) = self.topic else {
            return;
        };

        let watched = plate.watched_plate.is_some();
        let payload = build_plate_payload(&plate);
        tracing::debug!(topic = %topic, payload = %payload, "Sending MQTT message");

        match self
            .client
            .publish(topic.clone(), QoS::AtLeastOnce, false, payload.to_string())
            .await
        {
            Ok(()) => self.stats.record_publish(watched),
            Err(e) => {
                tracing::error!(topic = %topic, error = %e, "Failed to publish plate message");
            }
        }
    }
}

/// Build the MQTT client/event loop pair from configuration.
pub fn create_mqtt_client(config: &FrigateConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(MQTT_CLIENT_ID, &config.mqtt_server, config.mqtt_port);
    options.set_keep_alive(MQTT_KEEP_ALIVE);

    if let Some(ref username) = config.mqtt_username {
        let password = config.mqtt_password.clone().unwrap_or_default();
        options.set_credentials(username.clone(), password);
    }

    AsyncClient::new(options, 64)
}

/// Subscriber loop: delivers every events-topic publish to the worker pool
/// and drains in-flight workers on shutdown.
pub struct MqttSubscriber {
    client: AsyncClient,
    events_topic: String,
    pipeline: Arc<EventPipeline>,
    stats: Arc<PipelineStats>,
    workers: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl MqttSubscriber {
    pub fn new(
        client: AsyncClient,
        config: &FrigateConfig,
        pipeline: Arc<EventPipeline>,
        stats: Arc<PipelineStats>,
        max_workers: usize,
    ) -> Self {
        Self {
            client,
            events_topic: format!("{}/events", config.main_topic),
            pipeline,
            stats,
            workers: Arc::new(Semaphore::new(max_workers)),
            tracker: TaskTracker::new(),
        }
    }

    /// Drive the MQTT event loop until shutdown is requested, then wait for
    /// in-flight pipeline traversals to finish.
    pub async fn run(&self, mut event_loop: EventLoop, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping MQTT loop");
                    break;
                }
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        tracing::info!("MQTT connected");
                        if let Err(e) = self
                            .client
                            .subscribe(self.events_topic.clone(), QoS::AtMostOnce)
                            .await
                        {
                            tracing::error!(error = %e, "Failed to subscribe to events topic");
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if publish.topic == self.events_topic {
                            self.dispatch(publish.payload.to_vec());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "MQTT connection error, retrying");
                        tokio::time::sleep(RECONNECT_PAUSE).await;
                    }
                }
            }
        }

        let _ = self.client.disconnect().await;
        self.tracker.close();
        tracing::info!("Waiting for in-flight workers to drain");
        self.tracker.wait().await;
    }

    /// Hand one inbound payload to a worker. The semaphore bounds true
    /// concurrency; the tracker lets shutdown drain in-flight traversals.
    fn dispatch(&self, payload: Vec<u8>) {
        let pipeline = self.pipeline.clone();
        let stats = self.stats.clone();
        let workers = self.workers.clone();

        self.tracker.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            let outcome = pipeline.process(&payload).await;
            stats.record_outcome(outcome.as_str());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbound(watched: Option<&str>, fuzzy: Option<f64>) -> OutboundPlate {
        OutboundPlate {
            plate_number: Some("ab12cd".to_string()),
            plate_score: Some(0.91),
            event_id: "evt-1".to_string(),
            camera_name: "front".to_string(),
            formatted_start_time: "2026-08-08 10:00:00".to_string(),
            watched_plate: watched.map(String::from),
            fuzzy_score: fuzzy,
        }
    }

    #[test]
    fn test_non_watched_payload() {
        let payload = build_plate_payload(&outbound(None, None));
        assert_eq!(payload["plate_number"], "AB12CD");
        assert_eq!(payload["score"], 0.91);
        assert_eq!(payload["frigate_event_id"], "evt-1");
        assert_eq!(payload["camera_name"], "front");
        assert_eq!(payload["start_time"], "2026-08-08 10:00:00");
        assert_eq!(payload["is_watched_plate"], false);
        assert!(payload.get("original_plate").is_none());
        assert!(payload.get("fuzzy_score").is_none());
    }

    #[test]
    fn test_watched_payload_carries_original_plate() {
        let payload = build_plate_payload(&outbound(Some("abc123"), Some(0.83)));
        assert_eq!(payload["plate_number"], "ABC123");
        assert_eq!(payload["original_plate"], "AB12CD");
        assert_eq!(payload["fuzzy_score"], 0.83);
        assert_eq!(payload["is_watched_plate"], true);
    }

    #[test]
    fn test_missing_plate_number_serializes_null() {
        let mut plate = outbound(None, None);
        plate.plate_number = None;
        plate.plate_score = None;
        let payload = build_plate_payload(&plate);
        assert!(payload["plate_number"].is_null());
        assert!(payload["score"].is_null());
    }
}
