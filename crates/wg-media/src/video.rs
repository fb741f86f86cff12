//! Frame I/O seam between the pipeline and the codec backend.

use std::path::Path;

use image::RgbImage;
use wg_models::Detection;

use crate::error::{MediaError, MediaResult};

/// Output container extension for annotated videos.
pub const OUTPUT_EXTENSION: &str = "webm";

/// Content type of annotated videos.
pub const OUTPUT_CONTENT_TYPE: &str = "video/webm";

/// Frame rate assumed when the container does not report a usable one.
pub const FALLBACK_FPS: f64 = 30.0;

/// Dimensions and frame rate of a video stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoGeometry {
    /// Build geometry from container metadata.
    ///
    /// A zero dimension means the stream cannot be read. A missing, NaN or
    /// negative frame rate is replaced by `default_fps`.
    pub fn new(width: u32, height: u32, fps: f64, default_fps: f64) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_input(format!(
                "Video reports invalid dimensions {}x{}",
                width, height
            )));
        }

        let fallback = if default_fps.is_finite() && default_fps > 0.0 {
            default_fps
        } else {
            FALLBACK_FPS
        };
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { fallback };

        Ok(Self { width, height, fps })
    }

    /// Frames between reporting samples: one per second of video time.
    pub fn sampling_cadence(&self) -> u64 {
        sampling_cadence(self.fps)
    }
}

/// Rounded frame rate, never less than 1.
pub fn sampling_cadence(fps: f64) -> u64 {
    if !fps.is_finite() || fps <= 0.0 {
        return 1;
    }
    (fps.round() as u64).max(1)
}

/// Sequential decoded frames from a file or camera.
pub trait FrameSource: Send {
    fn geometry(&self) -> VideoGeometry;

    /// Next frame, or `None` at end of stream. A frame that fails to decode
    /// also ends the stream.
    fn next_frame(&mut self) -> Option<RgbImage>;
}

/// Annotating encoder for an output video.
pub trait FrameSink: Send {
    /// Draw the detections onto the frame and append it to the output.
    fn write_frame(&mut self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<()>;

    /// Flush and close the output.
    fn finish(&mut self) -> MediaResult<()>;
}

/// Codec backend used by the pipeline and the live preview.
pub trait MediaBackend: Send + Sync {
    fn open_video(&self, path: &Path, default_fps: f64) -> MediaResult<Box<dyn FrameSource>>;

    fn open_writer(&self, path: &Path, geometry: VideoGeometry) -> MediaResult<Box<dyn FrameSink>>;

    fn open_camera(&self, index: i32, width: u32, height: u32) -> MediaResult<Box<dyn FrameSource>>;

    /// Annotate a frame and encode it as JPEG.
    fn encode_jpeg(&self, frame: &RgbImage, detections: &[Detection]) -> MediaResult<Vec<u8>>;
}
