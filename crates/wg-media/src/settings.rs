//! Detection settings.

/// Settings applied to every detection request.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    /// Minimum confidence for a detection to be reported
    pub confidence_threshold: f32,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Frame rate assumed when a video reports none
    pub default_fps: f64,
    /// Live preview settings
    pub live: LiveFeedSettings,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.4,
            input_size: 640,
            default_fps: 30.0,
            live: LiveFeedSettings::default(),
        }
    }
}

impl DetectionSettings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            confidence_threshold: env_parse("CONFIDENCE_THRESHOLD")
                .unwrap_or(defaults.confidence_threshold),
            input_size: env_parse("MODEL_INPUT_SIZE").unwrap_or(defaults.input_size),
            default_fps: env_parse("DEFAULT_FPS").unwrap_or(defaults.default_fps),
            live: LiveFeedSettings::from_env(),
        }
    }
}

/// Settings for the live camera preview.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveFeedSettings {
    /// Local camera device index
    pub camera_index: i32,
    /// Frames are resized to this width before inference
    pub frame_width: u32,
    /// Frames are resized to this height before inference
    pub frame_height: u32,
    /// Confidence threshold for preview annotations
    pub confidence_threshold: f32,
    /// Encoded frames buffered ahead of a slow client
    pub buffer_frames: usize,
}

impl Default for LiveFeedSettings {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            confidence_threshold: 0.5,
            buffer_frames: 2,
        }
    }
}

impl LiveFeedSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            camera_index: env_parse("LIVE_CAMERA_INDEX").unwrap_or(defaults.camera_index),
            frame_width: env_parse("LIVE_FRAME_WIDTH").unwrap_or(defaults.frame_width),
            frame_height: env_parse("LIVE_FRAME_HEIGHT").unwrap_or(defaults.frame_height),
            confidence_threshold: env_parse("LIVE_CONFIDENCE_THRESHOLD")
                .unwrap_or(defaults.confidence_threshold),
            buffer_frames: env_parse("LIVE_BUFFER_FRAMES").unwrap_or(defaults.buffer_frames),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
