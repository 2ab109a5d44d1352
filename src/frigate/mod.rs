//! FrigateClient - NVR HTTP API adapter
//!
//! ## Responsibilities
//!
//! - Fetch cropped/uncropped event snapshots
//! - Fetch final event attributes (scored license-plate boxes)
//! - Push the recognized sublabel back onto the event
//!
//! Every operation is tolerant: failures are logged and surface as `None`
//! or a no-op, never as pipeline errors.

use crate::event_model::EventAttribute;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Frigate caps sublabels at 20 characters.
const SUBLABEL_MAX_LEN: usize = 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// NVR-facing operations consumed by the pipeline and snapshot writer.
#[async_trait]
pub trait FrigateApi: Send + Sync {
    /// Snapshot JPEG for the event; `None` on any failure.
    async fn fetch_snapshot(&self, event_id: &str, cropped: bool) -> Option<Vec<u8>>;

    /// Final license-plate attributes for the event; `None` when absent or
    /// unavailable.
    async fn fetch_plate_attributes(&self, event_id: &str) -> Option<Vec<EventAttribute>>;

    /// Push the recognized plate as the event sublabel. Best-effort.
    async fn set_sublabel(&self, event_id: &str, sublabel: &str, score: Option<f64>);
}

#[derive(Debug, Deserialize)]
struct EventDetailResponse {
    #[serde(default)]
    data: EventDetailData,
}

#[derive(Debug, Default, Deserialize)]
struct EventDetailData {
    #[serde(default)]
    attributes: Vec<EventAttribute>,
}

pub struct FrigateClient {
    client: reqwest::Client,
    base_url: String,
}

impl FrigateClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl FrigateApi for FrigateClient {
    async fn fetch_snapshot(&self, event_id: &str, cropped: bool) -> Option<Vec<u8>> {
        let url = format!("{}/api/events/{}/snapshot.jpg", self.base_url, event_id);
        tracing::debug!(event_id = %event_id, cropped, "Getting snapshot");

        let response = self
            .client
            .get(&url)
            .query(&[("crop", if cropped { 1 } else { 0 }), ("quality", 95)])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Error getting snapshot");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                event_id = %event_id,
                status = %response.status(),
                "Error getting snapshot"
            );
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Error reading snapshot body");
                None
            }
        }
    }

    async fn fetch_plate_attributes(&self, event_id: &str) -> Option<Vec<EventAttribute>> {
        let url = format!("{}/api/events/{}", self.base_url, event_id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Error getting final event data");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::error!(
                event_id = %event_id,
                status = %response.status(),
                "Error getting final event data"
            );
            return None;
        }

        let detail: EventDetailResponse = match response.json().await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Error parsing event JSON");
                return None;
            }
        };

        let plates: Vec<EventAttribute> = detail
            .data
            .attributes
            .into_iter()
            .filter(|attribute| attribute.label == "license_plate")
            .collect();

        if plates.is_empty() {
            None
        } else {
            Some(plates)
        }
    }

    async fn set_sublabel(&self, event_id: &str, sublabel: &str, score: Option<f64>) {
        let url = format!("{}/api/events/{}/sub_label", self.base_url, event_id);
        let sublabel = format_sublabel(sublabel);
        tracing::debug!(event_id = %event_id, sublabel = %sublabel, "Setting sublabel");

        let payload = json!({ "subLabel": sublabel });
        let response = match self.client.post(&url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "Failed to set sublabel");
                return;
            }
        };

        if response.status().is_success() {
            let percent = score.map(|s| format!("{:.1}%", s * 100.0));
            tracing::info!(
                sublabel = %sublabel,
                confidence = ?percent,
                "Sublabel set successfully"
            );
        } else {
            tracing::error!(
                status = %response.status(),
                "Failed to set sublabel"
            );
        }
    }
}

/// Plates are always upper-cased and truncated to the NVR's sublabel limit.
pub fn format_sublabel(sublabel: &str) -> String {
    let truncated: String = sublabel.chars().take(SUBLABEL_MAX_LEN).collect();
    truncated.to_uppercase()
}
