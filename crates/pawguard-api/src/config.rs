//! API configuration.

use std::path::PathBuf;
use std::time::Duration;

use pawguard_vision::{DetectorConfig, EmbedderConfig};

/// API server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size (base64 photos are large)
    pub max_body_size: usize,
    /// Upper bound on a single detect+embed inference call
    pub inference_timeout: Duration,
    /// Detector model and scan threshold
    pub detector: DetectorConfig,
    /// Embedding model; `None` disables the embedding path
    pub embedder: Option<EmbedderConfig>,
    /// Minimum confidence for a detection to appear in the response
    pub retention_threshold: f32,
    /// When set, decoded request images are dumped here for debugging
    pub diagnostic_dump_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let detector = DetectorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 10 * 1024 * 1024, // 10MB
            inference_timeout: Duration::from_secs(30),
            retention_threshold: detector.confidence_threshold,
            detector,
            embedder: None,
            diagnostic_dump_dir: None,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = DetectorConfig::default();

        let confidence_threshold = env_parse("DETECTOR_CONFIDENCE_THRESHOLD")
            .unwrap_or(defaults.confidence_threshold);

        let detector = DetectorConfig {
            model_path: std::env::var("DETECTOR_MODEL_PATH")
                .unwrap_or(defaults.model_path),
            confidence_threshold,
            nms_threshold: env_parse("DETECTOR_NMS_THRESHOLD").unwrap_or(defaults.nms_threshold),
            input_size: env_parse("DETECTOR_INPUT_SIZE").unwrap_or(defaults.input_size),
        };

        // Embedding runs only when a model path is configured.
        let embedder = std::env::var("EMBEDDING_MODEL_PATH").ok().map(|model_path| {
            let defaults = EmbedderConfig::default();
            EmbedderConfig {
                model_path,
                input_size: env_parse("EMBEDDING_INPUT_SIZE").unwrap_or(defaults.input_size),
                dimension: env_parse("EMBEDDING_DIMENSION").unwrap_or(defaults.dimension),
            }
        });

        Self {
            host: std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("API_PORT").unwrap_or(5000),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["*".to_string()]),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(10 * 1024 * 1024),
            inference_timeout: Duration::from_secs(
                env_parse("INFERENCE_TIMEOUT_SECS").unwrap_or(30),
            ),
            detector,
            embedder,
            // Retention defaults to the scan threshold; set a stricter value
            // to keep the low-sensitivity scan for diagnostics only.
            retention_threshold: env_parse("RETENTION_THRESHOLD").unwrap_or(confidence_threshold),
            diagnostic_dump_dir: std::env::var("DIAGNOSTIC_DUMP_DIR").ok().map(PathBuf::from),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
