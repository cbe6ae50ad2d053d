//! Visual embedding of detection crops via a pretrained ONNX extractor.
//!
//! The adapter owns feature extraction only; the pipeline owns cropping and
//! L2 normalization, so stub embedders in tests stay trivial.

use std::path::Path;
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use crate::error::{VisionError, VisionResult};

/// Pretrained feature extractor, invoked with the primary detection's crop.
///
/// Returns the raw (un-normalized) feature vector.
pub trait FeatureEmbedder: Send + Sync {
    fn embed(&self, crop: &DynamicImage) -> VisionResult<Vec<f32>>;

    /// Expected output dimensionality.
    fn dimension(&self) -> usize;
}

/// Configuration for the embedding extractor.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Square input size the model expects
    pub input_size: u32,
    /// Output vector dimensionality
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            model_path: "models/embedding.onnx".to_string(),
            input_size: 224,
            dimension: 512,
        }
    }
}

/// ImageNet channel statistics used by most pretrained extractors.
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// ONNX Runtime-backed feature embedder.
#[derive(Debug)]
pub struct OrtEmbedder {
    session: Mutex<Session>,
    config: EmbedderConfig,
    output_name: String,
}

impl OrtEmbedder {
    /// Load the embedder from config.
    pub fn new(config: EmbedderConfig) -> VisionResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(VisionError::model_not_found(&config.model_path));
        }

        let model_bytes = std::fs::read(model_path)
            .map_err(|e| VisionError::internal(format!("Failed to read model file: {e}")))?;

        let session = Session::builder()
            .map_err(|e| VisionError::internal(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VisionError::internal(format!("Failed to set optimization level: {e}")))?
            .commit_from_memory(model_bytes.as_slice())
            .map_err(|e| VisionError::internal(format!("Failed to load ONNX model: {e}")))?;

        // Extractors name their output differently; record it at load time.
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| VisionError::internal("Embedding model has no outputs"))?;

        info!(
            model_path = %config.model_path,
            dimension = config.dimension,
            output = %output_name,
            "Feature embedder initialized"
        );

        Ok(Self {
            session: Mutex::new(session),
            config,
            output_name,
        })
    }

    /// Preprocess a crop: resize, RGB, ImageNet mean/std, NCHW.
    fn preprocess(&self, crop: &DynamicImage) -> VisionResult<Value> {
        let input_size = self.config.input_size;

        let resized = crop.resize_exact(
            input_size,
            input_size,
            image::imageops::FilterType::Triangle,
        );
        let rgb = resized.to_rgb8();
        let (w, h) = (input_size as usize, input_size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = rgb.get_pixel(x as u32, y as u32);
                    let v = pixel[c] as f32 / 255.0;
                    chw_data.push((v - IMAGENET_MEAN[c]) / IMAGENET_STD[c]);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| VisionError::inference(format!("Failed to create tensor: {e}")))
    }
}

impl FeatureEmbedder for OrtEmbedder {
    fn embed(&self, crop: &DynamicImage) -> VisionResult<Vec<f32>> {
        let input = self.preprocess(crop)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| VisionError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::inference(format!("ONNX inference failed: {e}")))?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| VisionError::inference("Embedding model returned no outputs"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::inference(format!("Failed to extract tensor: {e}")))?;

        // Flatten [1, D] (or [D]) to a plain vector.
        let features: Vec<f32> = tensor.1.iter().copied().collect();
        if features.len() != self.config.dimension {
            return Err(VisionError::inference(format!(
                "Unexpected embedding dimension: expected {}, got {}",
                self.config.dimension,
                features.len()
            )));
        }

        Ok(features)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

/// Scale a raw feature vector to unit L2 norm in place.
///
/// A zero-norm vector cannot be normalized and is an inference error.
pub fn l2_normalize(vector: &mut [f32]) -> VisionResult<()> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if !norm.is_finite() || norm <= f32::EPSILON {
        return Err(VisionError::inference(
            "Embedding vector has zero or non-finite norm",
        ));
    }
    for v in vector.iter_mut() {
        *v /= norm;
    }
    Ok(())
}
