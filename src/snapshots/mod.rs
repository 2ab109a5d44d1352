//! SnapshotSaver - annotated snapshot persistence
//!
//! ## Responsibilities
//!
//! - Fetch the full (uncropped) event snapshot
//! - Draw the license-plate box when final attributes are available
//! - Write `{PLATE}_{camera}_{timestamp}.png` under the snapshot directory
//!
//! Saving is best-effort: any failure is logged and swallowed so snapshot
//! trouble never changes a pipeline outcome.

use crate::event_model::EventData;
use crate::frigate::FrigateApi;
use crate::metrics::PipelineStats;
use async_trait::async_trait;
use chrono::Local;
use image::{DynamicImage, Rgba};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M";

/// Snapshot persistence consumed by the pipeline.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&self, after: &EventData, plate_number: Option<&str>);
}

/// Snapshot sink config, carved out of the Frigate section.
#[derive(Debug, Clone)]
pub struct SnapshotSaverConfig {
    pub snapshot_dir: PathBuf,
    pub save_snapshots: bool,
    pub frigate_plus: bool,
    pub draw_box: bool,
}

pub struct SnapshotSaver {
    frigate: Arc<dyn FrigateApi>,
    config: SnapshotSaverConfig,
    stats: Arc<PipelineStats>,
}

impl SnapshotSaver {
    pub fn new(
        frigate: Arc<dyn FrigateApi>,
        config: SnapshotSaverConfig,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            frigate,
            config,
            stats,
        }
    }
}

#[async_trait]
impl SnapshotSink for SnapshotSaver {
    async fn save(&self, after: &EventData, plate_number: Option<&str>) {
        if !self.config.save_snapshots {
            tracing::debug!("Skipping saving snapshot because save_snapshots is set to false");
            return;
        }

        let plate_box = if self.config.frigate_plus && self.config.draw_box {
            self.frigate
                .fetch_plate_attributes(&after.id)
                .await
                .and_then(|attributes| attributes.first().and_then(|a| a.bounding_box))
        } else {
            None
        };

        let Some(snapshot) = self.frigate.fetch_snapshot(&after.id, false).await else {
            return;
        };

        let mut image = match image::load_from_memory(&snapshot) {
            Ok(image) => image,
            Err(e) => {
                tracing::error!(event_id = %after.id, error = %e, "Failed to decode snapshot image");
                return;
            }
        };

        if let Some(normalized_box) = plate_box {
            draw_plate_box(&mut image, normalized_box);
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let mut image_name = format!("{}_{}.png", after.camera, timestamp);
        if let Some(plate) = plate_number {
            image_name = format!("{}_{}", plate.to_uppercase(), image_name);
        }

        let mut encoded = Vec::new();
        if let Err(e) = image.write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png) {
            tracing::error!(event_id = %after.id, error = %e, "Failed to encode snapshot image");
            return;
        }

        if let Err(e) = tokio::fs::create_dir_all(&self.config.snapshot_dir).await {
            tracing::error!(error = %e, "Failed to create snapshot directory");
            return;
        }

        let image_path = self.config.snapshot_dir.join(&image_name);
        match tokio::fs::write(&image_path, &encoded).await {
            Ok(()) => {
                tracing::info!(path = %image_path.display(), "Saved snapshot image");
                self.stats.record_snapshot_saved();
            }
            Err(e) => {
                tracing::error!(path = %image_path.display(), error = %e, "Failed to save snapshot");
            }
        }
    }
}

/// Scale the normalized [x, y, w, h] box to pixels and draw a 2px outline.
fn draw_plate_box(image: &mut DynamicImage, normalized_box: [f64; 4]) {
    let width = image.width() as f64;
    let height = image.height() as f64;

    let x = (normalized_box[0] * width) as i32;
    let y = (normalized_box[1] * height) as i32;
    let w = (normalized_box[2] * width).max(1.0) as u32;
    let h = (normalized_box[3] * height).max(1.0) as u32;

    tracing::debug!(x, y, w, h, "Drawing plate box");

    let mut canvas = image.to_rgba8();
    let red = Rgba([255u8, 0, 0, 255]);
    draw_hollow_rect_mut(&mut canvas, Rect::at(x, y).of_size(w, h), red);
    if w > 2 && h > 2 {
        draw_hollow_rect_mut(
            &mut canvas,
            Rect::at(x + 1, y + 1).of_size(w - 2, h - 2),
            red,
        );
    }
    *image = DynamicImage::ImageRgba8(canvas);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_draw_plate_box_marks_outline() {
        let mut image = DynamicImage::ImageRgba8(RgbaImage::new(100, 50));
        draw_plate_box(&mut image, [0.1, 0.2, 0.5, 0.4]);

        let canvas = image.to_rgba8();
        // Top-left corner of the box: x = 10, y = 10
        assert_eq!(canvas.get_pixel(10, 10), &Rgba([255, 0, 0, 255]));
        // Well inside the box stays untouched
        assert_eq!(canvas.get_pixel(30, 20), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_draw_plate_box_clamps_tiny_boxes() {
        let mut image = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        // Degenerate box still draws without panicking
        draw_plate_box(&mut image, [0.0, 0.0, 0.0, 0.0]);
    }
}
