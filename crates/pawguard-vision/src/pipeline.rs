//! Per-request detection pipeline.
//!
//! Composes the adapters into the service's actual logic: class filtering,
//! retention thresholding, confidence ranking, crop clamping, and embedding
//! normalization. Every stage returns an explicit `Result`; nothing signals
//! failure by panicking.

use std::path::PathBuf;
use std::sync::Arc;

use image::DynamicImage;
use pawguard_models::{AnimalClass, BoundingBox, Detection};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::detector::{AnimalDetector, RawDetection};
use crate::embedder::{l2_normalize, FeatureEmbedder};
use crate::error::{VisionError, VisionResult};

/// Tunables applied on top of the detector's scan threshold.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Minimum confidence for a detection to appear in the response.
    ///
    /// The detector scans at its own (possibly lower) threshold; anything
    /// between the two is logged for diagnostics and dropped.
    pub retention_threshold: f32,
    /// When set, decoded request images are written here for debugging.
    pub dump_dir: Option<PathBuf>,
}

/// Result of one pipeline run: retained detections plus the optional
/// embedding of the primary detection's crop.
#[derive(Debug, Clone)]
pub struct AnimalScan {
    /// Retained detections in detector-reported order (ranking is applied
    /// by the response composer).
    pub detections: Vec<Detection>,
    /// Unit-norm embedding of the primary detection, when computed.
    pub embedding: Option<Vec<f32>>,
}

/// Run detection (and optionally embedding) over a decoded image.
pub fn run_detection(
    img: &DynamicImage,
    detector: &Arc<dyn AnimalDetector>,
    embedder: Option<&Arc<dyn FeatureEmbedder>>,
    options: &PipelineOptions,
) -> VisionResult<AnimalScan> {
    if let Some(dir) = &options.dump_dir {
        dump_image(img, dir);
    }

    let raw = detector.detect(img)?;
    let detections = retain_animals(&raw, options.retention_threshold);

    // Primary is the highest-confidence retained detection; ties go to the
    // earlier detector-reported one, matching the response's stable sort.
    let mut primary: Option<&Detection> = None;
    for det in &detections {
        if primary.map_or(true, |p| det.confidence > p.confidence) {
            primary = Some(det);
        }
    }
    let primary = primary.cloned();

    let embedding = match (embedder, primary) {
        (Some(embedder), Some(primary)) => {
            Some(embed_primary(img, &primary, embedder.as_ref())?)
        }
        _ => None,
    };

    Ok(AnimalScan {
        detections,
        embedding,
    })
}

/// Keep cat/dog detections at or above the retention threshold, converting
/// corner-format boxes to origin+size.
pub fn retain_animals(raw: &[RawDetection], retention_threshold: f32) -> Vec<Detection> {
    let mut retained = Vec::new();

    for det in raw {
        let Some(class) = AnimalClass::from_class_id(det.class_id) else {
            continue;
        };

        if det.confidence < retention_threshold {
            debug!(
                class = class.name(),
                confidence = det.confidence,
                retention_threshold,
                "Scan hit below retention threshold"
            );
            continue;
        }

        retained.push(Detection::new(
            class,
            det.confidence,
            BoundingBox::from_corners(det.x1, det.y1, det.x2, det.y2),
        ));
    }

    retained
}

/// Crop the primary detection (clamped to image bounds), extract features,
/// and normalize to unit L2 norm.
fn embed_primary(
    img: &DynamicImage,
    primary: &Detection,
    embedder: &dyn FeatureEmbedder,
) -> VisionResult<Vec<f32>> {
    let crop = clamped_crop(img, &primary.bbox)?;
    let mut features = embedder.embed(&crop)?;
    l2_normalize(&mut features)?;
    Ok(features)
}

/// Crop a region from the image, clamping coordinates to the image bounds.
///
/// Detector boxes can extend slightly past the frame near edges; the clamp
/// keeps the crop valid. A region that is entirely outside the image is an
/// inference error.
pub fn clamped_crop(img: &DynamicImage, bbox: &BoundingBox) -> VisionResult<DynamicImage> {
    let (img_w, img_h) = (img.width() as f32, img.height() as f32);

    let x1 = bbox.x.clamp(0.0, img_w);
    let y1 = bbox.y.clamp(0.0, img_h);
    let x2 = (bbox.x + bbox.width).clamp(0.0, img_w);
    let y2 = (bbox.y + bbox.height).clamp(0.0, img_h);

    let x = x1.floor() as u32;
    let y = y1.floor() as u32;
    let w = (x2.ceil() as u32).saturating_sub(x);
    let h = (y2.ceil() as u32).saturating_sub(y);

    if w == 0 || h == 0 {
        return Err(VisionError::inference(format!(
            "Detection box ({}, {}, {}x{}) has no overlap with {}x{} image",
            bbox.x, bbox.y, bbox.width, bbox.height, img.width(), img.height()
        )));
    }

    Ok(img.crop_imm(x, y, w, h))
}

/// Best-effort debug dump of the decoded request image.
///
/// Failures are logged and never fail the request.
fn dump_image(img: &DynamicImage, dir: &PathBuf) {
    let path = dir.join(format!("request-{}.png", Uuid::new_v4()));
    if let Err(e) = img.save(&path) {
        warn!(path = %path.display(), error = %e, "Failed to dump request image");
    } else {
        debug!(path = %path.display(), "Dumped request image");
    }
}
