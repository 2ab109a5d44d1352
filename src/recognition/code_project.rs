//! CodeProject.AI backend (Backend B)
//!
//! Single-attempt multipart upload. Any failure yields an empty result;
//! retry policy is left to the NVR re-publishing the event.

use super::{RawRecognition, RecognitionBackend};
use crate::config::CodeProjectConfig;
use crate::metrics::PipelineStats;
use crate::watchlist::{BackendKind, PlateCandidate};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response from `/v1/image/alpr`. Index 0 of `predictions` is the primary
/// detection, not an alternate candidate.
#[derive(Debug, Deserialize)]
struct AlprResponse {
    #[serde(default)]
    predictions: Vec<AlprPrediction>,
}

#[derive(Debug, Deserialize)]
struct AlprPrediction {
    #[serde(default)]
    plate: Option<String>,

    #[serde(default)]
    confidence: Option<f64>,
}

pub struct CodeProjectBackend {
    client: reqwest::Client,
    api_url: String,
    stats: Arc<PipelineStats>,
}

impl CodeProjectBackend {
    pub fn new(config: &CodeProjectConfig, stats: Arc<PipelineStats>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config.api_url.clone(),
            stats,
        }
    }

    fn parse_response(&self, body: &str) -> RawRecognition {
        let payload: AlprResponse = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "CodeProject.AI returned invalid JSON response");
                return RawRecognition::empty();
            }
        };

        if payload.predictions.is_empty() {
            tracing::debug!("No plates found in CodeProject.AI response");
            return RawRecognition::empty();
        }

        let candidates: Vec<PlateCandidate> = payload
            .predictions
            .iter()
            .map(|prediction| PlateCandidate {
                plate: prediction.plate.clone(),
                score: None,
                confidence: prediction.confidence,
            })
            .collect();

        let top = &payload.predictions[0];
        RawRecognition {
            plate: top.plate.clone(),
            score: top.confidence,
            candidates,
        }
    }
}

#[async_trait]
impl RecognitionBackend for CodeProjectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CodeProject
    }

    async fn submit(&self, image: &[u8]) -> RawRecognition {
        self.stats.record_recognizer_call();

        let form = Form::new().part(
            "upload",
            Part::bytes(image.to_vec())
                .file_name("snapshot.jpg")
                .mime_str("image/jpeg")
                .expect("static mime type"),
        );

        let response = match self.client.post(&self.api_url).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(error = %e, "CodeProject.AI request failed");
                self.stats.record_recognizer_error();
                return RawRecognition::empty();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = %status, "CodeProject.AI request failed");
            self.stats.record_recognizer_error();
            return RawRecognition::empty();
        }

        match response.text().await {
            Ok(body) => self.parse_response(&body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to read CodeProject.AI response body");
                self.stats.record_recognizer_error();
                RawRecognition::empty()
            }
        }
    }
}
