//! Shared data models for the PawGuard detection backend.
//!
//! This crate provides Serde-serializable types for:
//! - Animal classes and their COCO class ids
//! - Detections and bounding boxes
//! - The `/detect` request/response wire contract

pub mod class;
pub mod detection;
pub mod response;

// Re-export common types
pub use class::AnimalClass;
pub use detection::{BoundingBox, Detection};
pub use response::{DetectRequest, DetectResponse, ErrorResponse};
