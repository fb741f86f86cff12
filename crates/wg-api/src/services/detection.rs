//! Request orchestration for detection uploads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wg_media::{
    Detector, DetectionSettings, LiveFeed, MediaBackend, MediaPipeline, OUTPUT_EXTENSION,
};
use wg_models::{sanitize_filename, DangerLexicon, DetectionReport, MediaKind};
use wg_storage::ArtifactPublisher;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::services::scratch::ScratchFiles;

/// Scratch name used when nothing survives filename sanitising.
const FALLBACK_UPLOAD_NAME: &str = "upload";

/// One uploaded file plus its caller namespace.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
    pub caller_id: String,
}

/// Stages uploads, runs the pipeline and publishes video artifacts.
///
/// All collaborators are injected so tests can substitute fakes.
#[derive(Clone)]
pub struct DetectionService {
    detector: Option<Arc<dyn Detector>>,
    lexicon: Arc<DangerLexicon>,
    backend: Arc<dyn MediaBackend>,
    publisher: Option<Arc<dyn ArtifactPublisher>>,
    settings: DetectionSettings,
    scratch_dir: PathBuf,
}

impl DetectionService {
    pub fn new(
        detector: Option<Arc<dyn Detector>>,
        lexicon: Arc<DangerLexicon>,
        backend: Arc<dyn MediaBackend>,
        publisher: Option<Arc<dyn ArtifactPublisher>>,
        settings: DetectionSettings,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            detector,
            lexicon,
            backend,
            publisher,
            settings,
            scratch_dir: scratch_dir.into(),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.detector.is_some()
    }

    pub fn publisher(&self) -> Option<&Arc<dyn ArtifactPublisher>> {
        self.publisher.as_ref()
    }

    fn pipeline(&self) -> ApiResult<MediaPipeline> {
        let detector = self.detector.clone().ok_or(ApiError::ModelUnavailable)?;
        Ok(MediaPipeline::new(
            detector,
            self.lexicon.clone(),
            self.backend.clone(),
            self.settings.clone(),
        ))
    }

    /// Live preview bound to the configured camera.
    pub fn live_feed(&self) -> ApiResult<LiveFeed> {
        let detector = self.detector.clone().ok_or(ApiError::ModelUnavailable)?;
        Ok(LiveFeed::new(
            detector,
            self.lexicon.clone(),
            self.backend.clone(),
            self.settings.live.clone(),
            self.settings.input_size,
        ))
    }

    /// Run detection on an uploaded file.
    ///
    /// Scratch files are removed when this returns, whatever the outcome.
    pub async fn detect(&self, upload: Upload) -> ApiResult<DetectionReport> {
        let pipeline = self.pipeline()?;

        let mut safe_name = sanitize_filename(&upload.filename);
        if safe_name.is_empty() {
            safe_name = FALLBACK_UPLOAD_NAME.to_string();
        }
        let kind = MediaKind::from_filename(&safe_name);
        let stamp = scratch_stamp();

        let mut scratch = ScratchFiles::new();
        let input = self.scratch_dir.join(format!("raw_{}_{}", stamp, safe_name));
        scratch.track(&input);

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create scratch dir: {}", e)))?;
        tokio::fs::write(&input, &upload.data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to stage upload: {}", e)))?;

        info!(
            filename = %safe_name,
            kind = %kind,
            bytes = upload.data.len(),
            "Upload staged"
        );

        let report = match kind {
            MediaKind::Image => {
                let detections = tokio::task::spawn_blocking(move || pipeline.process_image(&input))
                    .await
                    .map_err(|e| ApiError::internal(format!("Image task failed: {}", e)))??;
                DetectionReport::new(MediaKind::Image, detections, None)
            }
            MediaKind::Video => {
                let output = self
                    .scratch_dir
                    .join(format!("processed_{}.{}", stamp, OUTPUT_EXTENSION));
                scratch.track(&output);

                let outcome =
                    tokio::task::spawn_blocking(move || pipeline.process_video(&input, &output))
                        .await
                        .map_err(|e| ApiError::internal(format!("Video task failed: {}", e)))??;

                let url = self
                    .publish_artifact(&outcome.output_path, &upload.caller_id)
                    .await;
                DetectionReport::new(MediaKind::Video, outcome.detections, url)
            }
        };

        info!(
            kind = %report.media_kind,
            count = report.count,
            dangerous = report.dangerous_count(),
            published = report.artifact_url.is_some(),
            "Detection completed"
        );

        Ok(report)
    }

    /// Best-effort upload; any failure yields `None`.
    async fn publish_artifact(&self, output: &Path, caller_id: &str) -> Option<String> {
        let publisher = match &self.publisher {
            Some(publisher) => publisher,
            None => {
                debug!("Publishing disabled, skipping upload");
                return None;
            }
        };

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => {
                warn!(output = %output.display(), "Encoded output missing or empty, skipping upload");
                return None;
            }
        }

        match publisher.publish(output, caller_id).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Artifact upload failed, returning detections without URL");
                metrics::record_publish_failure();
                None
            }
        }
    }
}

/// Millisecond timestamp plus a short random suffix.
fn scratch_stamp() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp_millis(), &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_stamp_unique() {
        let a = scratch_stamp();
        let b = scratch_stamp();
        assert_ne!(a, b);
        let (millis, suffix) = a.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(suffix.len(), 8);
    }
}
