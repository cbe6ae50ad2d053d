use serde::{Deserialize, Serialize};

use crate::class::AnimalClass;

/// A bounding box in pixel coordinates, origin at the top-left corner.
///
/// Coordinates keep sub-pixel precision; nothing is rounded on the way out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate of the top-left corner in pixels
    pub x: f32,
    /// Y coordinate of the top-left corner in pixels
    pub y: f32,
    /// Width in pixels
    pub width: f32,
    /// Height in pixels
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build a box from two corner points, as reported by the detector.
    ///
    /// Corners are reordered if necessary so `width >= 0 && height >= 0`
    /// always holds, even for malformed corner pairs.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }
}

/// One recognized animal with class, confidence, and bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// COCO class id (15 = cat, 16 = dog)
    pub class_id: usize,
    /// Wire name of the class ("cat" or "dog")
    pub class_name: String,
    /// Detector confidence in [0, 1]
    pub confidence: f32,
    /// Location in pixel coordinates
    pub bbox: BoundingBox,
}

impl Detection {
    /// Create a detection for an animal class.
    pub fn new(class: AnimalClass, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id: class.class_id(),
            class_name: class.name().to_string(),
            confidence,
            bbox,
        }
    }

    /// The animal class of this detection.
    pub fn class(&self) -> Option<AnimalClass> {
        AnimalClass::from_class_id(self.class_id)
    }
}
