//! Detector adapter interface.
//!
//! The pipeline only sees this trait, so the ONNX-backed [`ObjectDetector`]
//! can be swapped for a fake in tests.
//!
//! [`ObjectDetector`]: crate::object_detector::ObjectDetector

use image::RgbImage;
use tracing::debug;
use wg_models::RawDetection;

use crate::error::{MediaError, MediaResult};

/// Given a frame, return the objects found in it.
///
/// Implementations must:
/// - return only detections with `confidence >= confidence_threshold`
/// - report boxes in the frame's own pixel space (top-left origin)
/// - leave the frame untouched
///
/// A loaded detector is shared read-only by every request.
pub trait Detector: Send + Sync {
    fn infer(
        &self,
        frame: &RgbImage,
        confidence_threshold: f32,
        input_size: u32,
    ) -> MediaResult<Vec<RawDetection>>;
}

/// Run `detector` and keep only detections at or above the threshold.
///
/// Callers go through here rather than [`Detector::infer`] so a
/// below-threshold result never reaches classification, whatever the
/// implementation returns.
pub fn infer_confident(
    detector: &dyn Detector,
    frame: &RgbImage,
    confidence_threshold: f32,
    input_size: u32,
) -> MediaResult<Vec<RawDetection>> {
    let mut raw = detector.infer(frame, confidence_threshold, input_size)?;
    let returned = raw.len();
    raw.retain(|d| d.confidence >= confidence_threshold);
    if raw.len() < returned {
        debug!(
            dropped = returned - raw.len(),
            confidence_threshold, "Dropped detections below threshold"
        );
    }
    Ok(raw)
}

/// Check the adapter preconditions shared by all detector implementations.
pub fn validate_request(frame: &RgbImage, confidence_threshold: f32, input_size: u32) -> MediaResult<()> {
    if !(confidence_threshold > 0.0 && confidence_threshold <= 1.0) {
        return Err(MediaError::invalid_input(format!(
            "Confidence threshold must be in (0, 1], got {}",
            confidence_threshold
        )));
    }
    if frame.width() == 0 || frame.height() == 0 {
        return Err(MediaError::invalid_input(format!(
            "Frame has zero size: {}x{}",
            frame.width(),
            frame.height()
        )));
    }
    if input_size == 0 {
        return Err(MediaError::invalid_input("Model input size must be non-zero"));
    }
    Ok(())
}
