//! Image decoding and pretrained-model adapters for the PawGuard backend.
//!
//! This crate provides:
//! - Base64/data-URI image decoding
//! - The YOLO detector adapter (ONNX Runtime)
//! - The feature-embedding adapter (ONNX Runtime)
//! - The per-request detection pipeline (filter, rank, crop, embed)

pub mod decode;
pub mod detector;
pub mod embedder;
pub mod error;
pub mod pipeline;

pub use decode::decode_base64_image;
pub use detector::{AnimalDetector, DetectorConfig, RawDetection, YoloDetector};
pub use embedder::{l2_normalize, EmbedderConfig, FeatureEmbedder, OrtEmbedder};
pub use error::{VisionError, VisionResult};
pub use pipeline::{run_detection, AnimalScan, PipelineOptions};
