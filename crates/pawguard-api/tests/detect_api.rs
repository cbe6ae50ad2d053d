//! API integration tests.
//!
//! The router is exercised end to end with stub detector/embedder adapters,
//! so no model files are needed.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageBuffer, ImageOutputFormat, Rgb};
use serde_json::{json, Value};
use tower::ServiceExt;

use pawguard_api::{create_router, ApiConfig, AppState};
use pawguard_vision::{AnimalDetector, FeatureEmbedder, RawDetection, VisionResult};

struct StubDetector(Vec<RawDetection>);

impl AnimalDetector for StubDetector {
    fn detect(&self, _img: &DynamicImage) -> VisionResult<Vec<RawDetection>> {
        Ok(self.0.clone())
    }

    fn model_name(&self) -> &str {
        "yolov8n-stub"
    }
}

struct StubEmbedder;

impl FeatureEmbedder for StubEmbedder {
    fn embed(&self, _crop: &DynamicImage) -> VisionResult<Vec<f32>> {
        Ok(vec![2.0; 16])
    }

    fn dimension(&self) -> usize {
        16
    }
}

fn raw(class_id: usize, confidence: f32) -> RawDetection {
    RawDetection {
        class_id,
        confidence,
        x1: 10.0,
        y1: 20.0,
        x2: 60.0,
        y2: 90.0,
    }
}

fn test_app(detections: Vec<RawDetection>, with_embedder: bool) -> axum::Router {
    let detector: Arc<dyn AnimalDetector> = Arc::new(StubDetector(detections));
    let embedder: Option<Arc<dyn FeatureEmbedder>> = if with_embedder {
        Some(Arc::new(StubEmbedder))
    } else {
        None
    };
    let state = AppState::with_adapters(ApiConfig::default(), detector, embedder);
    create_router(state)
}

fn png_base64() -> String {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(120, 100, Rgb([90, 90, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    STANDARD.encode(&bytes)
}

fn detect_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/detect")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_model() {
    let app = test_app(Vec::new(), false);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["model"], "yolov8n-stub");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn root_lists_endpoints() {
    let app = test_app(Vec::new(), false);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "PawGuard Detection Backend");
    assert!(json["endpoints"]["detect"].is_string());
}

#[tokio::test]
async fn missing_image_field_is_400() {
    let app = test_app(Vec::new(), false);

    let response = app.oneshot(detect_request(json!({}))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn non_base64_payload_is_400() {
    let app = test_app(Vec::new(), false);

    let response = app
        .oneshot(detect_request(json!({"image": "not-base64!!"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn undecodable_image_bytes_is_400() {
    let app = test_app(Vec::new(), false);
    let payload = STANDARD.encode(b"these bytes are not an image");

    let response = app
        .oneshot(detect_request(json!({"image": payload})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn malformed_json_body_is_400() {
    let app = test_app(Vec::new(), false);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/detect")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn no_animals_yields_empty_success() {
    // Detector sees a person (class 0), which is filtered out.
    let app = test_app(vec![raw(0, 0.95)], false);

    let response = app
        .oneshot(detect_request(json!({"image": png_base64()})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["detections"], json!([]));
    assert_eq!(json["dog_detected"], false);
    assert_eq!(json["cat_detected"], false);
    assert_eq!(json["primary_detection"], Value::Null);
    assert_eq!(json["embedding"], Value::Null);
}

#[tokio::test]
async fn dog_and_cat_fixture_ranks_dog_first() {
    // One high-confidence dog, one lower-confidence cat.
    let app = test_app(vec![raw(15, 0.55), raw(16, 0.92)], false);

    let response = app
        .oneshot(detect_request(json!({"image": png_base64()})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["dog_detected"], true);
    assert_eq!(json["cat_detected"], true);

    let detections = json["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0]["class_name"], "dog");
    assert_eq!(detections[0]["class_id"], 16);
    assert_eq!(json["primary_detection"], detections[0]);

    // Sorted descending, bbox dimensions non-negative
    let mut last = f64::INFINITY;
    for det in detections {
        let confidence = det["confidence"].as_f64().unwrap();
        assert!(confidence <= last);
        last = confidence;
        assert!(det["bbox"]["width"].as_f64().unwrap() >= 0.0);
        assert!(det["bbox"]["height"].as_f64().unwrap() >= 0.0);
    }
}

#[tokio::test]
async fn embedding_is_unit_norm_when_enabled() {
    let app = test_app(vec![raw(16, 0.9)], true);

    let response = app
        .oneshot(detect_request(json!({"image": png_base64()})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    let embedding = json["embedding"].as_array().unwrap();
    assert_eq!(embedding.len(), 16);
    let norm: f64 = embedding
        .iter()
        .map(|v| v.as_f64().unwrap().powi(2))
        .sum::<f64>()
        .sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn data_uri_prefix_is_accepted() {
    let app = test_app(vec![raw(16, 0.9)], false);
    let payload = format!("data:image/png;base64,{}", png_base64());

    let response = app
        .oneshot(detect_request(json!({"image": payload})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["dog_detected"], true);
}
