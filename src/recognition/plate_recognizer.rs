//! Plate Recognizer backend (Backend A)
//!
//! Multipart upload with bearer-token auth and bounded retry. Transport
//! failures, HTTP 429, and any other non-2xx response are retried with
//! exponential backoff until attempts are exhausted; a malformed response
//! body is terminal.

use super::retry::backoff_delay;
use super::{RawRecognition, RecognitionBackend};
use crate::config::PlateRecognizerConfig;
use crate::metrics::PipelineStats;
use crate::watchlist::{BackendKind, PlateCandidate};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

pub const PLATE_RECOGNIZER_BASE_URL: &str = "https://api.platerecognizer.com/v1/plate-reader";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct PlateReaderResponse {
    #[serde(default)]
    results: Vec<PlateReaderResult>,
}

#[derive(Debug, Deserialize)]
struct PlateReaderResult {
    #[serde(default)]
    plate: Option<String>,

    #[serde(default)]
    score: Option<f64>,

    #[serde(default)]
    candidates: Vec<PlateReaderCandidate>,
}

#[derive(Debug, Deserialize)]
struct PlateReaderCandidate {
    #[serde(default)]
    plate: Option<String>,

    #[serde(default)]
    score: Option<f64>,
}

pub struct PlateRecognizerBackend {
    client: reqwest::Client,
    api_url: String,
    token: String,
    regions: Vec<String>,
    max_retries: u32,
    stats: Arc<PipelineStats>,
}

impl PlateRecognizerBackend {
    pub fn new(config: &PlateRecognizerConfig, stats: Arc<PipelineStats>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| PLATE_RECOGNIZER_BASE_URL.to_string()),
            token: config.token.clone(),
            regions: config.regions.clone(),
            max_retries: config.max_retries,
            stats,
        }
    }

    /// Multipart forms are consumed on send, so each attempt rebuilds one.
    fn build_form(&self, image: &[u8]) -> Form {
        let mut form = Form::new().part(
            "upload",
            Part::bytes(image.to_vec())
                .file_name("snapshot.jpg")
                .mime_str("image/jpeg")
                .expect("static mime type"),
        );
        for region in &self.regions {
            form = form.text("regions", region.clone());
        }
        form
    }

    fn parse_response(&self, body: &str) -> RawRecognition {
        let payload: PlateReaderResponse = match serde_json::from_str(body) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Plate Recognizer returned invalid JSON response");
                self.stats.record_recognizer_error();
                return RawRecognition::empty();
            }
        };

        let Some(top) = payload.results.into_iter().next() else {
            tracing::debug!("No plates found in Plate Recognizer response");
            return RawRecognition::empty();
        };

        RawRecognition {
            plate: top.plate,
            score: top.score,
            candidates: top
                .candidates
                .into_iter()
                .map(|candidate| PlateCandidate {
                    plate: candidate.plate,
                    score: candidate.score,
                    confidence: None,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for PlateRecognizerBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PlateRecognizer
    }

    async fn submit(&self, image: &[u8]) -> RawRecognition {
        self.stats.record_recognizer_call();

        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let response = self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Token {}", self.token))
                .multipart(self.build_form(image))
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        attempt,
                        attempts,
                        error = %e,
                        "Plate Recognizer request failed"
                    );
                    if attempt == attempts {
                        self.stats.record_recognizer_error();
                        return RawRecognition::empty();
                    }
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 {
                tracing::warn!(attempt, attempts, "Plate Recognizer rate limit hit");
                if attempt == attempts {
                    self.stats.record_recognizer_error();
                    return RawRecognition::empty();
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(
                    attempt,
                    attempts,
                    status = %status,
                    body = %body,
                    "Plate Recognizer API error"
                );
                if attempt == attempts {
                    self.stats.record_recognizer_error();
                    return RawRecognition::empty();
                }
                tokio::time::sleep(backoff_delay(attempt)).await;
                continue;
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read Plate Recognizer response body");
                    self.stats.record_recognizer_error();
                    return RawRecognition::empty();
                }
            };

            return self.parse_response(&body);
        }

        tracing::error!("Failed to get plate number after exhausting retries");
        RawRecognition::empty()
    }
}
