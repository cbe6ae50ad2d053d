//! Animal detection handler.
//!
//! `POST /detect` accepts `{"image": "<base64 or data-URI>"}`, runs the
//! detection pipeline, and returns the composed response. Inference runs on
//! the blocking pool under a bounded timeout so a wedged model call cannot
//! hold a request open forever.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use pawguard_models::{DetectRequest, DetectResponse};
use pawguard_vision::{decode_base64_image, run_detection, AnimalScan, VisionResult};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Detect cats and dogs in a base64-encoded photo.
pub async fn detect(
    State(state): State<AppState>,
    payload: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let Json(request) = payload?;
    let image_b64 = request
        .image
        .ok_or_else(|| ApiError::validation("No image provided"))?;

    let detector = Arc::clone(&state.detector);
    let embedder = state.embedder.clone();
    let options = state.pipeline_options();
    let timeout = state.config.inference_timeout;

    let scan: AnimalScan = tokio::time::timeout(
        timeout,
        tokio::task::spawn_blocking(move || -> VisionResult<AnimalScan> {
            let img = decode_base64_image(&image_b64)?;
            run_detection(&img, &detector, embedder.as_ref(), &options)
        }),
    )
    .await
    .map_err(|_| {
        warn!(timeout_secs = timeout.as_secs(), "Inference timed out");
        ApiError::Inference(format!(
            "Inference timed out after {}s",
            timeout.as_secs()
        ))
    })?
    .map_err(|e| ApiError::internal(format!("Inference task failed: {e}")))??;

    let response = DetectResponse::from_detections(scan.detections, scan.embedding);
    info!(
        detections = response.detections.len(),
        dog_detected = response.dog_detected,
        cat_detected = response.cat_detected,
        "Detection completed"
    );

    Ok(Json(response))
}
