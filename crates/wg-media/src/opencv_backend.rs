//! OpenCV codec backend.
//!
//! Decodes containers and cameras with `videoio`, draws annotations with
//! `imgproc` and encodes VP8 WebM or JPEG output.

use std::path::Path;

use image::RgbImage;
use opencv::core::{Mat, Point, Rect, Scalar, Size, Vector, CV_8UC3};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, VideoWriter, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH,
};
use tracing::{debug, warn};
use wg_models::Detection;

use crate::error::{MediaError, MediaResult};
use crate::video::{FrameSink, FrameSource, MediaBackend, VideoGeometry};

/// Box colour for dangerous classes (BGR red).
const DANGER_COLOR: (f64, f64, f64) = (0.0, 0.0, 255.0);
/// Box colour for benign classes (BGR green).
const SAFE_COLOR: (f64, f64, f64) = (0.0, 255.0, 0.0);

/// Production backend built on OpenCV.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpencvBackend;

impl OpencvBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for OpencvBackend {
    fn open_video(&self, path: &Path, default_fps: f64) -> MediaResult<Box<dyn FrameSource>> {
        let path_str = path_str(path)?;
        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| MediaError::invalid_input(format!("Cannot open video: {}", e)))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::invalid_input(format!(
                "Cannot open video {}",
                path.display()
            )));
        }

        let width = capture.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let height = capture.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        let fps = capture.get(CAP_PROP_FPS).unwrap_or(0.0);

        let geometry = VideoGeometry::new(to_dimension(width), to_dimension(height), fps, default_fps)?;
        debug!(path = %path.display(), ?geometry, "Opened video capture");

        Ok(Box::new(CaptureSource { capture, geometry }))
    }

    fn open_writer(&self, path: &Path, geometry: VideoGeometry) -> MediaResult<Box<dyn FrameSink>> {
        let path_str = path_str(path)?;
        let fourcc = VideoWriter::fourcc('V', 'P', '8', '0')
            .map_err(|e| MediaError::encoder_unavailable(e.to_string()))?;

        let writer = VideoWriter::new(
            path_str,
            fourcc,
            geometry.fps,
            Size::new(geometry.width as i32, geometry.height as i32),
            true,
        )
        .map_err(|e| MediaError::encoder_unavailable(format!("VP8 writer failed: {}", e)))?;

        if !writer.is_opened().unwrap_or(false) {
            return Err(MediaError::encoder_unavailable(format!(
                "VP8 writer could not open {}",
                path.display()
            )));
        }

        Ok(Box::new(AnnotatingWriter {
            writer,
            released: false,
        }))
    }

    fn open_camera(&self, index: i32, width: u32, height: u32) -> MediaResult<Box<dyn FrameSource>> {
        let mut capture = VideoCapture::new(index, CAP_ANY)
            .map_err(|e| MediaError::internal(format!("Cannot open camera {}: {}", index, e)))?;

        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::internal(format!("Camera {} unavailable", index)));
        }

        // Best effort; frames are resized by the caller anyway
        let _ = capture.set(CAP_PROP_FRAME_WIDTH, width as f64);
        let _ = capture.set(CAP_PROP_FRAME_HEIGHT, height as f64);

        let fps = capture.get(CAP_PROP_FPS).unwrap_or(0.0);
        let geometry = VideoGeometry::new(width, height, fps, 30.0)?;

        Ok(Box::new(CaptureSource { capture, geometry }))
    }

    fn encode_jpeg(&self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<Vec<u8>> {
        let mut bgr = rgb_to_bgr_mat(frame)?;
        annotate(&mut bgr, detections)?;

        let mut buffer = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", &bgr, &mut buffer, &Vector::new())
            .map_err(|e| MediaError::encode_failed(format!("JPEG encode failed: {}", e)))?;

        Ok(buffer.to_vec())
    }
}

/// Frames from a `VideoCapture`, released on drop.
struct CaptureSource {
    capture: VideoCapture,
    geometry: VideoGeometry,
}

impl FrameSource for CaptureSource {
    fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => {}
            Ok(_) => return None,
            Err(e) => {
                warn!(error = %e, "Frame decode failed, ending stream");
                return None;
            }
        }

        match bgr_mat_to_rgb(&frame) {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(error = %e, "Frame conversion failed, ending stream");
                None
            }
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            debug!(error = %e, "Failed to release capture");
        }
    }
}

/// VP8 writer that draws detections before encoding.
struct AnnotatingWriter {
    writer: VideoWriter,
    released: bool,
}

impl FrameSink for AnnotatingWriter {
    fn write_frame(&mut self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<()> {
        let mut bgr = rgb_to_bgr_mat(frame)?;
        annotate(&mut bgr, detections)?;
        self.writer
            .write(&bgr)
            .map_err(|e| MediaError::encode_failed(format!("Frame write failed: {}", e)))
    }

    fn finish(&mut self) -> MediaResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.writer
            .release()
            .map_err(|e| MediaError::encode_failed(format!("Writer release failed: {}", e)))
    }
}

impl Drop for AnnotatingWriter {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.writer.release() {
                debug!(error = %e, "Failed to release writer");
            }
        }
    }
}

/// Draw a box and `label confidence` caption per detection.
fn annotate(mat: &mut Mat, detections: &[Detection]) -> MediaResult<()> {
    for detection in detections {
        let (b, g, r) = if detection.is_dangerous() {
            DANGER_COLOR
        } else {
            SAFE_COLOR
        };
        let color = Scalar::new(b, g, r, 0.0);

        let bbox = detection.bounding_box();
        let rect = Rect::new(
            bbox.x_min.round() as i32,
            bbox.y_min.round() as i32,
            bbox.width().round().max(1.0) as i32,
            bbox.height().round().max(1.0) as i32,
        );
        imgproc::rectangle(mat, rect, color, 2, imgproc::LINE_8, 0).map_err(cv_draw_error)?;

        let caption = format!("{} {:.2}", detection.class_label(), detection.confidence());
        let origin = Point::new(rect.x, (rect.y - 6).max(12));
        imgproc::put_text(
            mat,
            &caption,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.5,
            color,
            1,
            imgproc::LINE_AA,
            false,
        )
        .map_err(cv_draw_error)?;
    }
    Ok(())
}

fn rgb_to_bgr_mat(frame: &RgbImage) -> MediaResult<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )
    .map_err(|e| MediaError::internal(format!("Mat allocation failed: {}", e)))?;

    rgb.data_bytes_mut()
        .map_err(|e| MediaError::internal(format!("Mat not continuous: {}", e)))?
        .copy_from_slice(frame.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)
        .map_err(|e| MediaError::internal(format!("Color conversion failed: {}", e)))?;
    Ok(bgr)
}

fn bgr_mat_to_rgb(mat: &Mat) -> MediaResult<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color_def(mat, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| MediaError::internal(format!("Color conversion failed: {}", e)))?;

    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    let bytes = rgb
        .data_bytes()
        .map_err(|e| MediaError::internal(format!("Mat not continuous: {}", e)))?
        .to_vec();

    RgbImage::from_raw(width, height, bytes)
        .ok_or_else(|| MediaError::internal("Frame buffer size mismatch"))
}

fn cv_draw_error(e: opencv::Error) -> MediaError {
    MediaError::internal(format!("Annotation failed: {}", e))
}

fn path_str(path: &Path) -> MediaResult<&str> {
    path.to_str()
        .ok_or_else(|| MediaError::invalid_input(format!("Non UTF-8 path: {}", path.display())))
}

fn to_dimension(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_dimension() {
        assert_eq!(to_dimension(640.0), 640);
        assert_eq!(to_dimension(0.0), 0);
        assert_eq!(to_dimension(f64::NAN), 0);
        assert_eq!(to_dimension(-1.0), 0);
    }

    #[test]
    fn test_missing_video_is_invalid_input() {
        let err = OpencvBackend::new()
            .open_video(Path::new("/nonexistent/clip.mp4"), 30.0)
            .err()
            .unwrap();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }
}
