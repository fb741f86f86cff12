//! Per-request detection report.

use serde::Serialize;

use crate::detection::Detection;
use crate::media_kind::MediaKind;

/// Final result of one detection request.
///
/// Built once per request and returned to the caller; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    pub count: usize,
    pub media_kind: MediaKind,
    /// Public URL of the annotated video, when encode and upload both succeeded
    pub artifact_url: Option<String>,
}

impl DetectionReport {
    pub fn new(media_kind: MediaKind, detections: Vec<Detection>, artifact_url: Option<String>) -> Self {
        Self {
            count: detections.len(),
            detections,
            media_kind,
            artifact_url,
        }
    }

    /// Number of detections flagged dangerous.
    pub fn dangerous_count(&self) -> usize {
        self.detections.iter().filter(|d| d.is_dangerous()).count()
    }
}
