//! Detection upload handler.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::debug;
use wg_models::{Detection, DetectionReport, MediaKind};

use crate::error::{ApiError, ApiResult};
use crate::services::Upload;
use crate::state::AppState;

/// Caller namespace used when the form carries no `user_id`.
pub const DEFAULT_USER_ID: &str = "unknown";

/// Response body of `POST /detect`.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub message: String,
    pub detections: Vec<Detection>,
    pub count: usize,
    pub video_url: Option<String>,
    #[serde(rename = "type")]
    pub media_kind: MediaKind,
}

impl From<DetectionReport> for DetectResponse {
    fn from(report: DetectionReport) -> Self {
        Self {
            message: "success".to_string(),
            count: report.count,
            detections: report.detections,
            video_url: report.artifact_url,
            media_kind: report.media_kind,
        }
    }
}

/// Accept a multipart upload (`file`, optional `user_id`) and run detection.
pub async fn detect(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut user_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                file = Some((filename, data.to_vec()));
            }
            Some("user_id") => {
                user_id = Some(field.text().await?);
            }
            other => {
                debug!(field = ?other, "Ignoring unknown multipart field");
            }
        }
    }

    let (filename, data) = file.ok_or_else(|| ApiError::bad_request("No file"))?;

    let upload = Upload {
        filename,
        data,
        caller_id: user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
    };

    let report = state.detection.detect(upload).await?;
    Ok(Json(report.into()))
}
