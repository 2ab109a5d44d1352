//! RecognitionClient - plate extraction behind one contract
//!
//! ## Responsibilities
//!
//! - Normalize the two recognition backends behind `RecognitionBackend`
//! - Resolve results against the watch-list
//! - Enforce the minimum-score floor (fuzzy matches exempt)
//!
//! The active backend is a capability choice fixed at configuration time
//! and injected once at startup; the pipeline never branches on backend
//! identity.

mod code_project;
mod plate_recognizer;
pub mod retry;

pub use code_project::CodeProjectBackend;
pub use plate_recognizer::PlateRecognizerBackend;

use crate::watchlist::{self, BackendKind, PlateCandidate};
use async_trait::async_trait;
use std::sync::Arc;

/// Raw backend output before watch-list resolution.
#[derive(Debug, Clone, Default)]
pub struct RawRecognition {
    pub plate: Option<String>,
    pub score: Option<f64>,
    pub candidates: Vec<PlateCandidate>,
}

impl RawRecognition {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// One external plate-recognition service.
///
/// `submit` never propagates transport failures: retry policy lives inside
/// the backend, and terminal failure yields an empty result.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn submit(&self, image: &[u8]) -> RawRecognition;
}

/// Final recognition outcome handed to the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlateLookup {
    pub plate_number: Option<String>,
    pub plate_score: Option<f64>,
    pub watched_plate: Option<String>,
    pub fuzzy_score: Option<f64>,
}

impl PlateLookup {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Recognition entry point owned by the pipeline.
pub struct RecognitionClient {
    backend: Arc<dyn RecognitionBackend>,
    watched_plates: Vec<String>,
    fuzzy_threshold: f64,
    min_score: Option<f64>,
}

impl RecognitionClient {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        watched_plates: Vec<String>,
        fuzzy_threshold: f64,
        min_score: Option<f64>,
    ) -> Self {
        Self {
            backend,
            watched_plates,
            fuzzy_threshold,
            min_score,
        }
    }

    /// Recognize a plate from snapshot bytes.
    ///
    /// An absent top plate short-circuits to an empty lookup without
    /// touching the watch-list. A tier-2 watched match replaces the score
    /// with the candidate's own confidence; a tier-3 fuzzy match keeps the
    /// recognition score and carries the ratio separately.
    pub async fn recognize(&self, image: &[u8]) -> PlateLookup {
        let raw = self.backend.submit(image).await;

        let Some(plate) = raw.plate else {
            return PlateLookup::empty();
        };

        let matched = watchlist::resolve(
            &plate,
            &raw.candidates,
            self.backend.kind(),
            &self.watched_plates,
            self.fuzzy_threshold,
        );

        let lookup = if matched.fuzzy_ratio.is_some() {
            PlateLookup {
                plate_number: Some(plate),
                plate_score: raw.score,
                watched_plate: matched.plate,
                fuzzy_score: matched.fuzzy_ratio,
            }
        } else if matched.plate.is_some() {
            PlateLookup {
                plate_number: Some(plate),
                plate_score: matched.score,
                watched_plate: matched.plate,
                fuzzy_score: None,
            }
        } else {
            PlateLookup {
                plate_number: Some(plate),
                plate_score: raw.score,
                watched_plate: None,
                fuzzy_score: None,
            }
        };

        self.apply_score_floor(lookup)
    }

    /// Reject recognitions below the configured minimum score unless a
    /// fuzzy watch-list match vouches for them: fuzzy confidence is a
    /// string-similarity ratio, not a recognition confidence.
    fn apply_score_floor(&self, lookup: PlateLookup) -> PlateLookup {
        let score_too_low = match (self.min_score, lookup.plate_score) {
            (Some(min), Some(score)) => score < min,
            _ => false,
        };

        if lookup.fuzzy_score.is_none() && score_too_low {
            tracing::info!(
                score = ?lookup.plate_score,
                plate = ?lookup.plate_number,
                "Score is below minimum"
            );
            return PlateLookup::empty();
        }

        lookup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBackend {
        kind: BackendKind,
        result: RawRecognition,
    }

    #[async_trait]
    impl RecognitionBackend for FixedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn submit(&self, _image: &[u8]) -> RawRecognition {
            self.result.clone()
        }
    }

    fn client_with(
        result: RawRecognition,
        watched: &[&str],
        fuzzy: f64,
        min_score: Option<f64>,
    ) -> RecognitionClient {
        RecognitionClient::new(
            Arc::new(FixedBackend {
                kind: BackendKind::PlateRecognizer,
                result,
            }),
            watched.iter().map(|w| w.to_string()).collect(),
            fuzzy,
            min_score,
        )
    }

    #[tokio::test]
    async fn test_empty_backend_result_short_circuits() {
        let client = client_with(RawRecognition::empty(), &["abc123"], 0.8, None);
        assert_eq!(client.recognize(b"jpeg").await, PlateLookup::empty());
    }

    #[tokio::test]
    async fn test_plain_recognition_passes_through() {
        let raw = RawRecognition {
            plate: Some("ab12cd".to_string()),
            score: Some(0.91),
            candidates: vec![],
        };
        let client = client_with(raw, &[], 0.0, Some(0.8));
        let lookup = client.recognize(b"jpeg").await;
        assert_eq!(lookup.plate_number.as_deref(), Some("ab12cd"));
        assert_eq!(lookup.plate_score, Some(0.91));
        assert_eq!(lookup.watched_plate, None);
        assert_eq!(lookup.fuzzy_score, None);
    }

    #[tokio::test]
    async fn test_candidate_match_replaces_score() {
        let raw = RawRecognition {
            plate: Some("xyz999".to_string()),
            score: Some(0.9),
            candidates: vec![PlateCandidate {
                plate: Some("def456".to_string()),
                score: Some(0.65),
                confidence: None,
            }],
        };
        let client = client_with(raw, &["def456"], 0.0, None);
        let lookup = client.recognize(b"jpeg").await;
        assert_eq!(lookup.plate_number.as_deref(), Some("xyz999"));
        assert_eq!(lookup.watched_plate.as_deref(), Some("def456"));
        assert_eq!(lookup.plate_score, Some(0.65));
        assert_eq!(lookup.fuzzy_score, None);
    }

    #[tokio::test]
    async fn test_low_score_without_fuzzy_is_rejected() {
        let raw = RawRecognition {
            plate: Some("ab12cd".to_string()),
            score: Some(0.5),
            candidates: vec![],
        };
        let client = client_with(raw, &[], 0.0, Some(0.8));
        assert_eq!(client.recognize(b"jpeg").await, PlateLookup::empty());
    }

    #[tokio::test]
    async fn test_fuzzy_match_is_exempt_from_score_floor() {
        let raw = RawRecognition {
            plate: Some("abc12d".to_string()),
            score: Some(0.5),
            candidates: vec![],
        };
        let client = client_with(raw, &["abc123"], 0.8, Some(0.8));
        let lookup = client.recognize(b"jpeg").await;
        assert_eq!(lookup.plate_number.as_deref(), Some("abc12d"));
        assert_eq!(lookup.watched_plate.as_deref(), Some("abc123"));
        assert_eq!(lookup.plate_score, Some(0.5));
        assert!(lookup.fuzzy_score.unwrap() >= 0.8);
    }

    #[tokio::test]
    async fn test_watched_self_match_keeps_raw_result() {
        let raw = RawRecognition {
            plate: Some("abc123".to_string()),
            score: Some(0.95),
            candidates: vec![],
        };
        let client = client_with(raw, &["abc123"], 0.8, None);
        let lookup = client.recognize(b"jpeg").await;
        assert_eq!(lookup.plate_number.as_deref(), Some("abc123"));
        assert_eq!(lookup.plate_score, Some(0.95));
        assert_eq!(lookup.watched_plate, None);
        assert_eq!(lookup.fuzzy_score, None);
    }
}
