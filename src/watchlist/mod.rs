//! WatchlistMatcher - three-tier watched-plate resolution
//!
//! ## Responsibilities
//!
//! - Suppress self-matches when the top plate is already a watched plate
//! - Surface watched plates hidden in the backend's candidate list
//! - Fuzzy-match the top plate against the watch-list as a last resort
//!
//! Resolution is deterministic and first-match-wins. The watch-list is an
//! ordered sequence; fuzzy ties go to the first entry in configured order.

use serde::Serialize;

/// Which recognition backend produced the candidate list. CodeProject.AI
/// reports the top plate again at candidate index 0, so that slot is never
/// an alternate reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    PlateRecognizer,
    CodeProject,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::PlateRecognizer => "plate_recognizer",
            BackendKind::CodeProject => "code_project",
        }
    }
}

/// An alternate plate reading offered by a backend. The confidence field
/// name differs per backend (`score` vs `confidence`), so both are carried.
#[derive(Debug, Clone, Default)]
pub struct PlateCandidate {
    pub plate: Option<String>,
    pub score: Option<f64>,
    pub confidence: Option<f64>,
}

impl PlateCandidate {
    fn confidence_for(&self, kind: BackendKind) -> Option<f64> {
        match kind {
            BackendKind::PlateRecognizer => self.score,
            BackendKind::CodeProject => self.confidence,
        }
    }
}

/// Outcome of watch-list resolution. At most one of the candidate-score
/// path (`score`) and the fuzzy path (`fuzzy_ratio`) is populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatchMatch {
    pub plate: Option<String>,
    pub score: Option<f64>,
    pub fuzzy_ratio: Option<f64>,
}

impl WatchMatch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plate.is_none()
    }
}

/// Resolve a recognition result against the watch-list.
///
/// Tier 1: a top plate that already equals a watched entry returns an empty
/// match — the raw recognition is already correct, and override semantics
/// are reserved for watched plates surfaced by the candidate list.
/// Tier 2: first candidate whose text is watched wins, carrying its own
/// confidence field. Tier 3: fuzzy ratio against every watched entry, best
/// ratio wins if it clears the threshold.
pub fn resolve(
    top_plate: &str,
    candidates: &[PlateCandidate],
    kind: BackendKind,
    watched_plates: &[String],
    fuzzy_threshold: f64,
) -> WatchMatch {
    if top_plate.is_empty() || watched_plates.is_empty() {
        return WatchMatch::empty();
    }

    let watched: Vec<String> = watched_plates
        .iter()
        .map(|plate| plate.to_lowercase())
        .collect();
    let top_lower = top_plate.to_lowercase();

    // Tier 1 - exact top-plate suppression
    if watched.contains(&top_lower) {
        tracing::info!(plate = %top_plate, "Recognised plate is already a watched plate");
        return WatchMatch::empty();
    }

    // Tier 2 - candidate scan
    for (index, candidate) in candidates.iter().enumerate() {
        if kind == BackendKind::CodeProject && index == 0 {
            continue;
        }
        let Some(ref plate) = candidate.plate else {
            continue;
        };
        if watched.contains(&plate.to_lowercase()) {
            let score = candidate.confidence_for(kind);
            tracing::info!(plate = %plate, score = ?score, "Watched plate found from candidates");
            return WatchMatch {
                plate: Some(plate.clone()),
                score,
                fuzzy_ratio: None,
            };
        }
    }

    // Tier 3 - fuzzy fallback
    if fuzzy_threshold <= 0.0 {
        tracing::debug!("Skipping fuzzy matching because no threshold is configured");
        return WatchMatch::empty();
    }

    let mut best_match: Option<&str> = None;
    let mut best_ratio = 0.0;
    for entry in &watched {
        let ratio = strsim::normalized_levenshtein(&top_lower, entry);
        if ratio > best_ratio {
            best_ratio = ratio;
            best_match = Some(entry);
        }
    }

    tracing::debug!(best = ?best_match, ratio = best_ratio, "Best fuzzy match");
    if let Some(entry) = best_match {
        if best_ratio >= fuzzy_threshold {
            tracing::info!(plate = %entry, ratio = best_ratio, "Watched plate found from fuzzy matching");
            return WatchMatch {
                plate: Some(entry.to_string()),
                score: None,
                fuzzy_ratio: Some(best_ratio),
            };
        }
    }

    WatchMatch::empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(plate: &str, score: Option<f64>, confidence: Option<f64>) -> PlateCandidate {
        PlateCandidate {
            plate: Some(plate.to_string()),
            score,
            confidence,
        }
    }

    fn watched(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_empty_watchlist_never_matches() {
        let result = resolve("ABC123", &[], BackendKind::PlateRecognizer, &[], 0.9);
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier1_self_match_is_suppressed() {
        // Even with a matching candidate and a fuzzy threshold that would
        // fire, an exact top-plate hit must return an empty match.
        let candidates = vec![candidate("ABC123", Some(0.9), None)];
        let result = resolve(
            "ABC123",
            &candidates,
            BackendKind::PlateRecognizer,
            &watched(&["abc123"]),
            0.5,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier1_is_case_insensitive() {
        let result = resolve(
            "abc123",
            &[],
            BackendKind::PlateRecognizer,
            &watched(&["ABC123"]),
            0.0,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier2_candidate_match_carries_own_score() {
        let candidates = vec![
            candidate("XYZ999", Some(0.7), None),
            candidate("DEF456", Some(0.65), None),
        ];
        let result = resolve(
            "ABC123",
            &candidates,
            BackendKind::PlateRecognizer,
            &watched(&["def456"]),
            0.0,
        );
        assert_eq!(result.plate.as_deref(), Some("DEF456"));
        assert_eq!(result.score, Some(0.65));
        assert_eq!(result.fuzzy_ratio, None);
    }

    #[test]
    fn test_tier2_first_hit_wins() {
        let candidates = vec![
            candidate("DEF456", Some(0.6), None),
            candidate("GHI789", Some(0.9), None),
        ];
        let result = resolve(
            "ABC123",
            &candidates,
            BackendKind::PlateRecognizer,
            &watched(&["ghi789", "def456"]),
            0.0,
        );
        assert_eq!(result.plate.as_deref(), Some("DEF456"));
    }

    #[test]
    fn test_tier2_code_project_skips_index_zero() {
        // Index 0 duplicates the top plate for CodeProject.AI and must not
        // be treated as an alternate reading.
        let candidates = vec![
            candidate("DEF456", None, Some(0.9)),
            candidate("DEF456", None, Some(0.4)),
        ];
        let result = resolve(
            "ABC123",
            &candidates,
            BackendKind::CodeProject,
            &watched(&["def456"]),
            0.0,
        );
        assert_eq!(result.plate.as_deref(), Some("DEF456"));
        assert_eq!(result.score, Some(0.4));
    }

    #[test]
    fn test_tier2_code_project_reads_confidence_field() {
        let candidates = vec![
            candidate("ABC123", None, Some(0.9)),
            candidate("DEF456", Some(0.99), Some(0.42)),
        ];
        let result = resolve(
            "ABC123X",
            &candidates,
            BackendKind::CodeProject,
            &watched(&["def456"]),
            0.0,
        );
        assert_eq!(result.score, Some(0.42));
    }

    #[test]
    fn test_tier3_fuzzy_ratio_on_near_miss() {
        let result = resolve(
            "ABC12D",
            &[],
            BackendKind::PlateRecognizer,
            &watched(&["abc123"]),
            0.8,
        );
        assert_eq!(result.plate.as_deref(), Some("abc123"));
        assert_eq!(result.score, None);
        let ratio = result.fuzzy_ratio.unwrap();
        assert!((ratio - 0.8333).abs() < 0.01, "ratio was {ratio}");
    }

    #[test]
    fn test_tier3_below_threshold_is_empty() {
        let result = resolve(
            "ZZZZZZ",
            &[],
            BackendKind::PlateRecognizer,
            &watched(&["abc123"]),
            0.8,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier3_disabled_when_threshold_zero() {
        let result = resolve(
            "ABC12D",
            &[],
            BackendKind::PlateRecognizer,
            &watched(&["abc123"]),
            0.0,
        );
        assert!(result.is_empty());
    }

    #[test]
    fn test_tier3_tie_breaks_to_first_configured_entry() {
        // Both entries are one edit away; the first in configured order wins.
        let result = resolve(
            "ABC12X",
            &[],
            BackendKind::PlateRecognizer,
            &watched(&["abc124", "abc125"]),
            0.5,
        );
        assert_eq!(result.plate.as_deref(), Some("abc124"));
    }
}
