//! Application state.

use std::sync::Arc;

use tracing::{error, info, warn};
use wg_media::{
    DetectionSettings, Detector, ObjectDetector, ObjectDetectorConfig, OpencvBackend,
    OUTPUT_CONTENT_TYPE,
};
use wg_models::DangerLexicon;
use wg_storage::{ArtifactPublisher, R2Client, StoragePublisher};

use crate::config::ApiConfig;
use crate::services::DetectionService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub detection: DetectionService,
}

impl AppState {
    /// Create application state from the environment.
    ///
    /// A model or storage failure does not stop the server: detection routes
    /// report the model as offline, and videos are returned without a URL.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let settings = DetectionSettings::from_env();
        let lexicon = DangerLexicon::from_env();
        info!(dangerous_classes = lexicon.len(), "Danger lexicon loaded");

        let detector_config = ObjectDetectorConfig::from_env();
        let detector = match tokio::task::spawn_blocking(move || ObjectDetector::new(detector_config))
            .await?
        {
            Ok(detector) => Some(Arc::new(detector) as Arc<dyn Detector>),
            Err(e) => {
                error!(error = %e, "Failed to load detection model, detection routes disabled");
                None
            }
        };

        let publisher = match R2Client::from_env().await {
            Ok(client) => Some(Arc::new(StoragePublisher::new(client, OUTPUT_CONTENT_TYPE))
                as Arc<dyn ArtifactPublisher>),
            Err(e) => {
                warn!(error = %e, "Artifact storage not configured, video URLs disabled");
                None
            }
        };

        tokio::fs::create_dir_all(&config.scratch_dir).await?;

        let detection = DetectionService::new(
            detector,
            Arc::new(lexicon),
            Arc::new(OpencvBackend::new()),
            publisher,
            settings,
            config.scratch_dir.clone(),
        );

        Ok(Self::from_parts(config, detection))
    }

    /// Assemble state from prebuilt parts.
    pub fn from_parts(config: ApiConfig, detection: DetectionService) -> Self {
        Self { config, detection }
    }
}
