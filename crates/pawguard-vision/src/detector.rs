//! Animal detection using a YOLOv8 ONNX model.
//!
//! The detector is a black box: pixel buffer in, raw corner-format
//! detections out. Class filtering and retention-threshold logic live in
//! the pipeline, not here.
//!
//! Execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
//! - CoreML on macOS
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};

use crate::error::{VisionError, VisionResult};

/// One raw detection as reported by the model, before any filtering.
///
/// Corners are in pixel coordinates of the original image, sub-pixel
/// precision preserved.
#[derive(Debug, Clone, Copy)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Pretrained detection model, invoked per request with a decoded image.
///
/// Implementations must be safe for concurrent calls; the ort-backed
/// implementation serializes access to its session internally.
pub trait AnimalDetector: Send + Sync {
    /// Run detection at the configured scan threshold.
    ///
    /// Zero detections is an empty Vec, never an error.
    fn detect(&self, img: &DynamicImage) -> VisionResult<Vec<RawDetection>>;

    /// Identifier of the loaded model, for the health endpoint.
    fn model_name(&self) -> &str;
}

/// Configuration for the YOLO detector.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Low-sensitivity scan threshold; retention is applied downstream
    pub confidence_threshold: f32,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// YOLOv8 detector backed by ONNX Runtime.
#[derive(Debug)]
pub struct YoloDetector {
    session: Mutex<Session>,
    config: DetectorConfig,
    model_name: String,
}

impl YoloDetector {
    /// Load the detector from config.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: DetectorConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        // Reject a bad input size at startup instead of on the first request.
        anchor_count(config.input_size)?;

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("yolov8n")
            .to_string();

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            confidence_threshold = config.confidence_threshold,
            input_size = config.input_size,
            "Animal detector initialized"
        );

        Ok(Self {
            session,
            config,
            model_name,
        })
    }

    /// Preprocess image for YOLOv8 inference.
    ///
    /// - Resize to model input size (640x640)
    /// - Normalize pixel values to [0, 1]
    /// - Convert to NCHW format (batch, channels, height, width)
    fn preprocess(&self, img: &DynamicImage) -> VisionResult<Value> {
        let input_size = self.config.input_size;

        let resized = img.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );

        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        // HWC -> CHW with normalization to [0, 1]
        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("Failed to create tensor: {e}")))
    }

    /// Run ONNX inference and pull out the flat output buffer.
    fn run_inference(&self, input: Value) -> VisionResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("ONNX inference failed: {e}")))?;

        // YOLOv8 output is [1, 84, 8400]
        let output = outputs
            .get("output0")
            .ok_or_else(|| VisionError::inference("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("Failed to extract tensor: {e}")))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

impl AnimalDetector for YoloDetector {
    fn detect(&self, img: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
        let input = self.preprocess(img)?;
        let outputs = self.run_inference(input)?;

        let candidates = parse_yolo_output(
            &outputs,
            img.width(),
            img.height(),
            self.config.input_size,
            self.config.confidence_threshold,
        )?;
        let detections = non_maximum_suppression(candidates, self.config.nms_threshold);

        debug!(count = detections.len(), "Detection scan completed");
        Ok(detections)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// YOLOv8 output is [1, 84, N] where 84 = 4 bbox + 80 class scores and N is
/// the anchor count for the input size (8400 at 640x640).
const NUM_CLASSES: usize = 80;
const NUM_FEATURES: usize = 84;

/// YOLO detection strides; the model predicts one candidate per cell of the
/// input downsampled by each stride.
const STRIDES: [u32; 3] = [8, 16, 32];

/// Number of detection candidates the model emits for a square input.
///
/// The input size must be divisible by the largest stride (32), which YOLO
/// exports require anyway.
pub fn anchor_count(input_size: u32) -> VisionResult<usize> {
    if input_size == 0 || input_size % 32 != 0 {
        return Err(VisionError::inference(format!(
            "Detector input size must be a positive multiple of 32, got {input_size}"
        )));
    }
    Ok(STRIDES
        .iter()
        .map(|stride| ((input_size / stride) as usize).pow(2))
        .sum())
}

/// Parse the raw YOLOv8 output buffer into corner-format pixel detections.
///
/// Candidates below `confidence_threshold` are dropped; boxes are scaled
/// from model coordinates back to the original image dimensions.
pub fn parse_yolo_output(
    outputs: &[f32],
    orig_width: u32,
    orig_height: u32,
    input_size: u32,
    confidence_threshold: f32,
) -> VisionResult<Vec<RawDetection>> {
    let num_boxes = anchor_count(input_size)?;
    if outputs.len() != NUM_FEATURES * num_boxes {
        return Err(VisionError::inference(format!(
            "Unexpected output size: expected {}, got {}",
            NUM_FEATURES * num_boxes,
            outputs.len()
        )));
    }

    // Output is [84, N]; transpose to iterate candidates row-wise.
    let output_array = Array::from_shape_vec((NUM_FEATURES, num_boxes), outputs.to_vec())
        .map_err(|e| VisionError::inference(format!("Failed to reshape output: {e}")))?;
    let transposed = output_array.t();

    let input_size = input_size as f32;
    let scale_w = orig_width as f32 / input_size;
    let scale_h = orig_height as f32 / input_size;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        // Center-format bbox
        let cx = transposed[[i, 0]];
        let cy = transposed[[i, 1]];
        let w = transposed[[i, 2]];
        let h = transposed[[i, 3]];

        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..NUM_CLASSES {
            let score = transposed[[i, 4 + c]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < confidence_threshold {
            continue;
        }

        // Center format -> corners, scaled to original pixel space.
        candidates.push(RawDetection {
            class_id: best_class,
            confidence: best_score,
            x1: (cx - w / 2.0) * scale_w,
            y1: (cy - h / 2.0) * scale_h,
            x2: (cx + w / 2.0) * scale_w,
            y2: (cy + h / 2.0) * scale_h,
        });
    }

    Ok(candidates)
}

/// Apply class-aware Non-Maximum Suppression to overlapping candidates.
fn non_maximum_suppression(mut detections: Vec<RawDetection>, nms_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i]);

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }
            if compute_iou(&detections[i], &detections[j]) > nms_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection over Union between two corner-format detections.
fn compute_iou(a: &RawDetection, b: &RawDetection) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1).max(0.0) * (a.y2 - a.y1).max(0.0);
    let area_b = (b.x2 - b.x1).max(0.0) * (b.y2 - b.y1).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> VisionResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| VisionError::internal(format!("Failed to read model file: {e}")))?;

    let builder = Session::builder()
        .map_err(|e| VisionError::internal(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {e}")))?;

    // Try CUDA on Linux with cuda feature
    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    // Try CoreML on macOS
    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {e}")))
}
