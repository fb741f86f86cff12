//! Live camera preview.
//!
//! A blocking producer reads camera frames, annotates them and pushes
//! multipart parts into a bounded channel. It stops when the camera stops
//! yielding frames or when the receiving side is dropped, releasing the
//! camera either way.

use std::sync::Arc;

use image::imageops::FilterType;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wg_models::DangerLexicon;

use crate::detector::{infer_confident, Detector};
use crate::error::MediaResult;
use crate::metrics;
use crate::settings::LiveFeedSettings;
use crate::video::MediaBackend;

/// Boundary token separating preview frames.
pub const MULTIPART_BOUNDARY: &str = "frame";

/// Content type of the preview stream.
pub fn multipart_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={}", MULTIPART_BOUNDARY)
}

/// Wrap one JPEG frame as a multipart part.
pub fn frame_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", MULTIPART_BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Annotated preview of a local camera.
#[derive(Clone)]
pub struct LiveFeed {
    detector: Arc<dyn Detector>,
    lexicon: Arc<DangerLexicon>,
    backend: Arc<dyn MediaBackend>,
    settings: LiveFeedSettings,
    input_size: u32,
}

impl LiveFeed {
    pub fn new(
        detector: Arc<dyn Detector>,
        lexicon: Arc<DangerLexicon>,
        backend: Arc<dyn MediaBackend>,
        settings: LiveFeedSettings,
        input_size: u32,
    ) -> Self {
        Self {
            detector,
            lexicon,
            backend,
            settings,
            input_size,
        }
    }

    /// Start the producer on the blocking pool.
    ///
    /// Returns the part stream and a handle resolving to the number of
    /// frames delivered.
    pub fn spawn(self) -> (mpsc::Receiver<Vec<u8>>, JoinHandle<MediaResult<u64>>) {
        let (tx, rx) = mpsc::channel(self.settings.buffer_frames.max(1));
        let handle = tokio::task::spawn_blocking(move || {
            let result = self.run(&tx);
            if let Err(e) = &result {
                warn!(error = %e, "Live feed stopped with error");
            }
            result
        });
        (rx, handle)
    }

    /// Produce parts until the camera ends or the receiver goes away.
    pub fn run(&self, tx: &mpsc::Sender<Vec<u8>>) -> MediaResult<u64> {
        let settings = &self.settings;
        let mut camera = self.backend.open_camera(
            settings.camera_index,
            settings.frame_width,
            settings.frame_height,
        )?;
        info!(camera_index = settings.camera_index, "Live feed started");

        let mut delivered: u64 = 0;
        while let Some(mut frame) = camera.next_frame() {
            if frame.width() != settings.frame_width || frame.height() != settings.frame_height {
                frame = image::imageops::resize(
                    &frame,
                    settings.frame_width,
                    settings.frame_height,
                    FilterType::Triangle,
                );
            }

            let raw = infer_confident(
                self.detector.as_ref(),
                &frame,
                settings.confidence_threshold,
                self.input_size,
            )?;
            let detections = self.lexicon.classify_all(raw);
            let jpeg = self.backend.encode_jpeg(&frame, &detections)?;

            if tx.blocking_send(frame_part(&jpeg)).is_err() {
                debug!(delivered, "Live feed client disconnected");
                break;
            }
            delivered += 1;
            metrics::record_live_frame();
        }

        info!(delivered, "Live feed stopped");
        Ok(delivered)
    }
}
