//! Application state.
//!
//! Models are loaded once at startup and shared read-only across request
//! handlers; nothing here is mutated after `AppState::new` returns.

use std::sync::Arc;

use pawguard_vision::{
    AnimalDetector, FeatureEmbedder, OrtEmbedder, PipelineOptions, YoloDetector,
};
use tracing::{info, warn};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub detector: Arc<dyn AnimalDetector>,
    pub embedder: Option<Arc<dyn FeatureEmbedder>>,
}

impl AppState {
    /// Load models and build the application state.
    ///
    /// A missing detector model is fatal; a missing embedding model just
    /// disables the embedding path.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let detector: Arc<dyn AnimalDetector> =
            Arc::new(YoloDetector::new(config.detector.clone())?);

        let embedder: Option<Arc<dyn FeatureEmbedder>> = match &config.embedder {
            Some(embedder_config) => match OrtEmbedder::new(embedder_config.clone()) {
                Ok(embedder) => {
                    info!(dimension = embedder.dimension(), "Embedding path enabled");
                    Some(Arc::new(embedder))
                }
                Err(e) => {
                    warn!(error = %e, "Embedding model unavailable, running detection-only");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            config,
            detector,
            embedder,
        })
    }

    /// Build state around preconstructed adapters (used by tests).
    pub fn with_adapters(
        config: ApiConfig,
        detector: Arc<dyn AnimalDetector>,
        embedder: Option<Arc<dyn FeatureEmbedder>>,
    ) -> Self {
        Self {
            config,
            detector,
            embedder,
        }
    }

    /// Pipeline tunables derived from the config.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            retention_threshold: self.config.retention_threshold,
            dump_dir: self.config.diagnostic_dump_dir.clone(),
        }
    }
}
