//! Metrics emitted by the detection pipeline.

use metrics::{counter, histogram};
use wg_models::{Detection, MediaKind};

/// Metric names as constants for consistency.
pub mod names {
    pub const MEDIA_PROCESSING_DURATION_SECONDS: &str = "wg_media_processing_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "wg_frames_processed_total";
    pub const DETECTIONS_TOTAL: &str = "wg_detections_total";
    pub const LIVE_FRAMES_TOTAL: &str = "wg_live_frames_total";
}

/// Record how long one request spent in the pipeline.
pub fn record_processing_duration(kind: MediaKind, duration_secs: f64) {
    let labels = [("kind", kind.as_str().to_string())];
    histogram!(names::MEDIA_PROCESSING_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record frames run through the detector.
pub fn record_frames_processed(kind: MediaKind, frames: u64) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(frames);
}

/// Record reported detections, split by danger flag.
pub fn record_detections(detections: &[Detection]) {
    let dangerous = detections.iter().filter(|d| d.is_dangerous()).count() as u64;
    let benign = detections.len() as u64 - dangerous;

    if dangerous > 0 {
        counter!(names::DETECTIONS_TOTAL, "dangerous" => "true").increment(dangerous);
    }
    if benign > 0 {
        counter!(names::DETECTIONS_TOTAL, "dangerous" => "false").increment(benign);
    }
}

/// Record one frame delivered to a live preview client.
pub fn record_live_frame() {
    counter!(names::LIVE_FRAMES_TOTAL).increment(1);
}
