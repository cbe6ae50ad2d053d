//! Base64 image decoding.
//!
//! Client apps send photos either as bare base64 or as a data URI
//! (`data:image/jpeg;base64,...`); both forms are accepted here.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::DynamicImage;

use crate::error::{VisionError, VisionResult};

/// Decode a base64 payload (optionally data-URI prefixed) into an image.
///
/// Returns `VisionError::Decode` when the base64 is malformed or the decoded
/// bytes do not parse as a supported image format.
pub fn decode_base64_image(payload: &str) -> VisionResult<DynamicImage> {
    // Strip a data-URI header if present; the encoded data follows the last comma.
    let encoded = payload.rsplit(',').next().unwrap_or(payload).trim();

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| VisionError::decode(format!("invalid base64 payload: {e}")))?;

    image::load_from_memory(&bytes)
        .map_err(|e| VisionError::decode(format!("unsupported or corrupt image bytes: {e}")))
}
