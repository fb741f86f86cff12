//! Detection and media processing for WildGuard.
//!
//! This crate provides:
//! - YOLOv8 object detection through ONNX Runtime
//! - Per-request aggregation of detections across video frames
//! - Annotated video re-encoding (VP8 WebM) and live camera preview
//!
//! Codec work sits behind the [`MediaBackend`] trait; the OpenCV backend is
//! compiled with the default `opencv` feature.

pub mod aggregator;
pub mod detector;
pub mod error;
pub mod live;
pub mod metrics;
pub mod object_detector;
pub mod pipeline;
pub mod settings;
pub mod video;

#[cfg(feature = "opencv")]
pub mod opencv_backend;

pub use aggregator::DetectionAggregator;
pub use detector::{infer_confident, Detector};
pub use error::{MediaError, MediaResult};
pub use live::{frame_part, multipart_content_type, LiveFeed, MULTIPART_BOUNDARY};
pub use object_detector::{ObjectDetector, ObjectDetectorConfig, COCO_CLASSES};
pub use pipeline::{MediaPipeline, VideoOutcome};
pub use settings::{DetectionSettings, LiveFeedSettings};
pub use video::{
    sampling_cadence, FrameSink, FrameSource, MediaBackend, VideoGeometry, OUTPUT_CONTENT_TYPE,
    OUTPUT_EXTENSION,
};

#[cfg(feature = "opencv")]
pub use opencv_backend::OpencvBackend;
