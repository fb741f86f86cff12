//! Image and video detection pipeline.
//!
//! Every call runs synchronously on the calling thread. Callers on an async
//! runtime should wrap it in `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use wg_models::{DangerLexicon, Detection, MediaKind};

use crate::aggregator::DetectionAggregator;
use crate::detector::{infer_confident, Detector};
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::settings::DetectionSettings;
use crate::video::{MediaBackend, VideoGeometry};

/// Result of annotating one video.
#[derive(Debug)]
pub struct VideoOutcome {
    /// Sampled detections in report order
    pub detections: Vec<Detection>,
    /// Frames decoded, annotated and re-encoded
    pub frames_processed: u64,
    /// Geometry of the source stream
    pub geometry: VideoGeometry,
    /// Annotated output file
    pub output_path: PathBuf,
}

/// Drives the detector over decoded media.
#[derive(Clone)]
pub struct MediaPipeline {
    detector: Arc<dyn Detector>,
    lexicon: Arc<DangerLexicon>,
    backend: Arc<dyn MediaBackend>,
    settings: DetectionSettings,
}

impl MediaPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        lexicon: Arc<DangerLexicon>,
        backend: Arc<dyn MediaBackend>,
        settings: DetectionSettings,
    ) -> Self {
        Self {
            detector,
            lexicon,
            backend,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    /// Detect every object in a single image.
    pub fn process_image(&self, input: &Path) -> MediaResult<Vec<Detection>> {
        let start = Instant::now();

        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        // Uploads may carry the wrong extension, so sniff the content
        let frame = image::io::Reader::open(input)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| MediaError::invalid_input(format!("Cannot decode image: {}", e)))?
            .to_rgb8();

        let raw = infer_confident(
            self.detector.as_ref(),
            &frame,
            self.settings.confidence_threshold,
            self.settings.input_size,
        )?;

        let mut aggregator = DetectionAggregator::new(1);
        aggregator.observe_all(self.lexicon.classify_all(raw));
        let detections = aggregator.finish();

        metrics::record_frames_processed(MediaKind::Image, 1);
        metrics::record_detections(&detections);
        metrics::record_processing_duration(MediaKind::Image, start.elapsed().as_secs_f64());

        info!(
            width = frame.width(),
            height = frame.height(),
            detections = detections.len(),
            "Image processed"
        );

        Ok(detections)
    }

    /// Annotate every frame of `input` into `output`, reporting the detections
    /// found on whole-second frames.
    ///
    /// A frame that fails to decode ends the loop; the frames written so far
    /// still form a valid output.
    pub fn process_video(&self, input: &Path, output: &Path) -> MediaResult<VideoOutcome> {
        let start = Instant::now();

        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let mut source = self.backend.open_video(input, self.settings.default_fps)?;
        let geometry = source.geometry();
        let mut sink = self.backend.open_writer(output, geometry)?;

        let mut aggregator = DetectionAggregator::new(geometry.sampling_cadence());
        info!(
            width = geometry.width,
            height = geometry.height,
            fps = geometry.fps,
            cadence = aggregator.cadence(),
            "Video opened"
        );

        let mut frame_index: u64 = 0;
        while let Some(frame) = source.next_frame() {
            let raw = infer_confident(
                self.detector.as_ref(),
                &frame,
                self.settings.confidence_threshold,
                self.settings.input_size,
            )?;
            let detections = self.lexicon.classify_all(raw);

            sink.write_frame(&frame, &detections)?;

            if aggregator.is_sampled(frame_index) {
                debug!(frame_index, detections = detections.len(), "Sampled frame");
                aggregator.observe(frame_index, detections);
            }
            frame_index += 1;
        }

        sink.finish()?;

        if frame_index == 0 {
            warn!(input = %input.display(), "Video yielded no frames");
        }

        let detections = aggregator.finish();

        metrics::record_frames_processed(MediaKind::Video, frame_index);
        metrics::record_detections(&detections);
        metrics::record_processing_duration(MediaKind::Video, start.elapsed().as_secs_f64());

        info!(
            frames = frame_index,
            detections = detections.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Video processed"
        );

        Ok(VideoOutcome {
            detections,
            frames_processed: frame_index,
            geometry,
            output_path: output.to_path_buf(),
        })
    }
}
