//! Shared data models for the WildGuard backend.
//!
//! This crate provides Serde-serializable types for:
//! - Detections and their bounding boxes
//! - The dangerous-class lexicon used to flag detections
//! - Media classification (image vs video)
//! - Per-request detection reports
//! - Filename sanitizing for scratch storage

pub mod detection;
pub mod lexicon;
pub mod media_kind;
pub mod report;
pub mod utils;

// Re-export common types
pub use detection::{BoundingBox, Detection, RawDetection};
pub use lexicon::{DangerLexicon, DEFAULT_DANGEROUS_CLASSES};
pub use media_kind::{MediaKind, MediaKindParseError, VIDEO_EXTENSIONS};
pub use report::DetectionReport;
pub use utils::sanitize_filename;
