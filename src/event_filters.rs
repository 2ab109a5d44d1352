//! Event admission filters
//!
//! Pure decision helpers applied before any network or database work.
//! Ordering matters: later pipeline stages assume these already rejected
//! events outside the configured zones/cameras/labels.

use crate::config::FrigateConfig;
use crate::event_model::{BeforeData, EventAttribute, EventData};

/// Reject an event unless it matches the configured zones, cameras, and
/// object labels.
///
/// When the attribute-scoring feature is off, an unchanged `top_score` on an
/// already-tracked event means the NVR re-published the same best frame for
/// unrelated attribute churn; recognizing it again would be a wasted call.
/// With attribute scoring on, the scored-attribute gate replaces that
/// shortcut.
pub fn check_invalid_event(
    config: &FrigateConfig,
    before: &BeforeData,
    after: &EventData,
    is_tracked: bool,
) -> bool {
    let matching_zone = config.zones.is_empty()
        || after
            .current_zones
            .iter()
            .any(|zone| config.zones.contains(zone));
    let matching_camera = config.camera.is_empty() || config.camera.contains(&after.camera);

    if !(matching_zone && matching_camera) {
        tracing::debug!(
            event_id = %after.id,
            camera = %after.camera,
            "Skipping event: does not match the configured zones/cameras"
        );
        return true;
    }

    if !config.valid_objects().contains(&after.label) {
        tracing::debug!(event_id = %after.id, label = %after.label, "Not a valid object label");
        return true;
    }

    if before.top_score == after.top_score && is_tracked && !config.frigate_plus {
        tracing::debug!(
            event_id = %after.id,
            top_score = ?after.top_score,
            "Duplicated best frame: top_score unchanged between before and after"
        );
        return true;
    }

    false
}

/// License-plate attributes from the `after` snapshot.
///
/// Only meaningful when the attribute-scoring feature is enabled; returns
/// `None` otherwise so callers can distinguish "feature off" from "no
/// attribute present".
pub fn get_license_plate_attributes<'a>(
    config: &FrigateConfig,
    after: &'a EventData,
) -> Option<Vec<&'a EventAttribute>> {
    if !config.frigate_plus {
        return None;
    }
    Some(
        after
            .current_attributes
            .iter()
            .filter(|attribute| attribute.label == "license_plate")
            .collect(),
    )
}

/// Require a license-plate attribute scored at or above the configured
/// minimum.
pub fn is_valid_license_plate(config: &FrigateConfig, after: &EventData) -> bool {
    let attributes = get_license_plate_attributes(config, after).unwrap_or_default();
    let Some(first) = attributes.first() else {
        tracing::debug!(event_id = %after.id, "No license_plate attribute found in event attributes");
        return false;
    };

    let score = first.score.unwrap_or(0.0);
    if score < config.license_plate_min_score {
        tracing::debug!(
            event_id = %after.id,
            score,
            "license_plate attribute score is below minimum"
        );
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> FrigateConfig {
        serde_yaml::from_str(
            r#"
frigate_url: http://frigate.local:5000
mqtt_server: mqtt.local
"#,
        )
        .unwrap()
    }

    fn event(camera: &str, label: &str, zones: &[&str]) -> EventData {
        EventData {
            id: "evt-1".to_string(),
            camera: camera.to_string(),
            label: label.to_string(),
            current_zones: zones.iter().map(|z| z.to_string()).collect(),
            current_attributes: vec![],
            has_snapshot: true,
            start_time: 1700000000.0,
            top_score: Some(0.8),
        }
    }

    fn plate_attribute(score: f64) -> EventAttribute {
        EventAttribute {
            label: "license_plate".to_string(),
            score: Some(score),
            bounding_box: None,
        }
    }

    #[test]
    fn test_accepts_valid_object_with_no_filters() {
        let config = base_config();
        let after = event("front", "car", &[]);
        assert!(!check_invalid_event(
            &config,
            &BeforeData { top_score: Some(0.7) },
            &after,
            false
        ));
    }

    #[test]
    fn test_rejects_wrong_label() {
        let config = base_config();
        let after = event("front", "person", &[]);
        assert!(check_invalid_event(&config, &BeforeData::default(), &after, false));
    }

    #[test]
    fn test_rejects_camera_outside_filter() {
        let mut config = base_config();
        config.camera = vec!["front".to_string()];
        let after = event("rear", "car", &[]);
        assert!(check_invalid_event(&config, &BeforeData::default(), &after, false));
    }

    #[test]
    fn test_zone_filter_requires_intersection() {
        let mut config = base_config();
        config.zones = vec!["driveway".to_string()];

        let outside = event("front", "car", &["street"]);
        assert!(check_invalid_event(&config, &BeforeData::default(), &outside, false));

        let inside = event("front", "car", &["street", "driveway"]);
        assert!(!check_invalid_event(
            &config,
            &BeforeData { top_score: Some(0.1) },
            &inside,
            false
        ));
    }

    #[test]
    fn test_unchanged_top_score_on_tracked_event_is_duplicate() {
        let config = base_config();
        let after = event("front", "car", &[]);
        let before = BeforeData { top_score: Some(0.8) };

        assert!(check_invalid_event(&config, &before, &after, true));
        // Not yet tracked: the same frame still gets a first chance.
        assert!(!check_invalid_event(&config, &before, &after, false));
    }

    #[test]
    fn test_score_equality_shortcut_skipped_with_attribute_scoring() {
        let mut config = base_config();
        config.frigate_plus = true;
        let after = event("front", "car", &[]);
        let before = BeforeData { top_score: Some(0.8) };
        assert!(!check_invalid_event(&config, &before, &after, true));
    }

    #[test]
    fn test_attributes_none_when_feature_off() {
        let config = base_config();
        let mut after = event("front", "car", &[]);
        after.current_attributes = vec![plate_attribute(0.9)];
        assert!(get_license_plate_attributes(&config, &after).is_none());
    }

    #[test]
    fn test_valid_license_plate_requires_attribute() {
        let mut config = base_config();
        config.frigate_plus = true;
        let after = event("front", "car", &[]);
        assert!(!is_valid_license_plate(&config, &after));
    }

    #[test]
    fn test_valid_license_plate_enforces_min_score() {
        let mut config = base_config();
        config.frigate_plus = true;
        config.license_plate_min_score = 0.6;

        let mut after = event("front", "car", &[]);
        after.current_attributes = vec![plate_attribute(0.5)];
        assert!(!is_valid_license_plate(&config, &after));

        after.current_attributes = vec![plate_attribute(0.6)];
        assert!(is_valid_license_plate(&config, &after));
    }

    #[test]
    fn test_only_first_plate_attribute_is_scored() {
        let mut config = base_config();
        config.frigate_plus = true;
        config.license_plate_min_score = 0.6;

        let mut after = event("front", "car", &[]);
        after.current_attributes = vec![plate_attribute(0.2), plate_attribute(0.9)];
        assert!(!is_valid_license_plate(&config, &after));
    }
}
