use serde::{Deserialize, Serialize};

use crate::class::AnimalClass;
use crate::detection::Detection;

/// Request body for `POST /detect`.
///
/// `image` is optional at the serde level so a missing key surfaces as a
/// validation error with the contract's error body instead of a
/// deserialization failure.
#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    /// Base64-encoded image, optionally with a data-URI prefix
    #[serde(default)]
    pub image: Option<String>,
}

/// Successful response body for `POST /detect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub success: bool,
    /// Retained detections, sorted by confidence descending
    pub detections: Vec<Detection>,
    pub dog_detected: bool,
    pub cat_detected: bool,
    /// Highest-confidence detection, `null` when nothing was retained
    pub primary_detection: Option<Detection>,
    /// Unit-norm embedding of the primary detection's crop, when computed
    pub embedding: Option<Vec<f32>>,
}

impl DetectResponse {
    /// Compose a response from retained detections.
    ///
    /// Sorts by confidence descending (stable, so detector order breaks
    /// ties), derives the per-class flags, and selects the primary.
    pub fn from_detections(mut detections: Vec<Detection>, embedding: Option<Vec<f32>>) -> Self {
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let dog_detected = detections
            .iter()
            .any(|d| d.class() == Some(AnimalClass::Dog));
        let cat_detected = detections
            .iter()
            .any(|d| d.class() == Some(AnimalClass::Cat));
        let primary_detection = detections.first().cloned();

        Self {
            success: true,
            detections,
            dog_detected,
            cat_detected,
            primary_detection,
            embedding,
        }
    }

    /// Response for an image with no qualifying detections.
    pub fn empty() -> Self {
        Self::from_detections(Vec::new(), None)
    }
}

/// Uniform error body for 4xx/5xx responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    fn det(class: AnimalClass, confidence: f32) -> Detection {
        Detection::new(class, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn empty_response_has_no_flags_or_primary() {
        let resp = DetectResponse::empty();
        assert!(resp.success);
        assert!(resp.detections.is_empty());
        assert!(!resp.dog_detected);
        assert!(!resp.cat_detected);
        assert!(resp.primary_detection.is_none());
        assert!(resp.embedding.is_none());
    }

    #[test]
    fn sorts_by_confidence_descending() {
        let resp = DetectResponse::from_detections(
            vec![
                det(AnimalClass::Cat, 0.55),
                det(AnimalClass::Dog, 0.92),
                det(AnimalClass::Cat, 0.71),
            ],
            None,
        );
        let confidences: Vec<f32> = resp.detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.92, 0.71, 0.55]);
        for pair in resp.detections.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn ties_keep_detector_order() {
        let mut first = det(AnimalClass::Cat, 0.8);
        first.bbox = BoundingBox::new(1.0, 1.0, 5.0, 5.0);
        let mut second = det(AnimalClass::Dog, 0.8);
        second.bbox = BoundingBox::new(2.0, 2.0, 5.0, 5.0);

        let resp = DetectResponse::from_detections(vec![first.clone(), second.clone()], None);
        assert_eq!(resp.detections[0], first);
        assert_eq!(resp.detections[1], second);
    }

    #[test]
    fn primary_is_first_element() {
        let resp = DetectResponse::from_detections(
            vec![det(AnimalClass::Cat, 0.4), det(AnimalClass::Dog, 0.9)],
            None,
        );
        assert_eq!(
            resp.primary_detection.as_ref().unwrap(),
            &resp.detections[0]
        );
        assert_eq!(resp.detections[0].class_name, "dog");
    }

    #[test]
    fn flags_track_retained_classes() {
        let dogs_only = DetectResponse::from_detections(vec![det(AnimalClass::Dog, 0.9)], None);
        assert!(dogs_only.dog_detected);
        assert!(!dogs_only.cat_detected);

        let both = DetectResponse::from_detections(
            vec![det(AnimalClass::Dog, 0.9), det(AnimalClass::Cat, 0.6)],
            None,
        );
        assert!(both.dog_detected);
        assert!(both.cat_detected);
    }

    #[test]
    fn null_fields_serialize_as_json_null() {
        let json = serde_json::to_value(DetectResponse::empty()).unwrap();
        assert_eq!(json["primary_detection"], serde_json::Value::Null);
        assert_eq!(json["embedding"], serde_json::Value::Null);
        assert_eq!(json["detections"], serde_json::json!([]));
    }

    #[test]
    fn missing_image_field_deserializes_to_none() {
        let req: DetectRequest = serde_json::from_str("{}").unwrap();
        assert!(req.image.is_none());
    }
}
