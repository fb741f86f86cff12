//! Media kind classification.
//!
//! Uploads are routed by file extension: the video extensions below go
//! through the frame-by-frame video path, everything else is decoded as a
//! still image. The same classification drives the response `type` field.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Extensions (lower-case, without the dot) handled as video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// Kind of media carried by an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Single still image, one inference pass.
    Image,
    /// Container decoded frame by frame, annotated and re-encoded.
    Video,
}

impl MediaKind {
    /// Classify a filename by its extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        let is_video = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                VIDEO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);

        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = MediaKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            _ => Err(MediaKindParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown media kind: {0}")]
pub struct MediaKindParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_extensions() {
        for name in ["clip.mp4", "clip.avi", "clip.mov", "clip.mkv", "CLIP.MKV", "a.b.Mov"] {
            assert_eq!(MediaKind::from_filename(name), MediaKind::Video, "{name}");
        }
    }

    #[test]
    fn test_everything_else_is_image() {
        for name in ["cat.jpg", "cat.png", "noext", "clip.mp4.jpg", "clip.webm", ""] {
            assert_eq!(MediaKind::from_filename(name), MediaKind::Image, "{name}");
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("video".parse::<MediaKind>().unwrap(), MediaKind::Video);
        assert_eq!("IMAGE".parse::<MediaKind>().unwrap(), MediaKind::Image);
        assert!("audio".parse::<MediaKind>().is_err());
        assert_eq!(MediaKind::Video.to_string(), "video");
        assert_eq!(serde_json::to_string(&MediaKind::Image).unwrap(), "\"image\"");
    }
}
