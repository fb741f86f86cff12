//! Business logic services.

pub mod detection;
pub mod scratch;

pub use detection::{DetectionService, Upload};
pub use scratch::ScratchFiles;
