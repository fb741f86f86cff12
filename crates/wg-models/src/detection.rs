//! Detection types.
//!
//! A [`RawDetection`] is what the detector returns for one object in one
//! frame. It becomes a [`Detection`] once the danger lexicon has flagged it;
//! see [`crate::DangerLexicon::classify`], which is the only constructor.

use serde::Serialize;

/// Axis-aligned box in the frame's pixel space (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f32; 4]")]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Create a box from two corners. Corner order is normalized so that
    /// `x_max >= x_min` and `y_max >= y_min`.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x_min: x1.min(x2),
            y_min: y1.min(y2),
            x_max: x1.max(x2),
            y_max: y1.max(y2),
        }
    }

    /// Create a box from its top-left corner and size.
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// True when the box covers no area.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Clamp the box to a `width` x `height` frame.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        Self {
            x_min: self.x_min.clamp(0.0, w),
            y_min: self.y_min.clamp(0.0, h),
            x_max: self.x_max.clamp(0.0, w),
            y_max: self.y_max.clamp(0.0, h),
        }
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x_min.max(other.x_min);
        let y1 = self.y_min.max(other.y_min);
        let x2 = self.x_max.min(other.x_max);
        let y2 = self.y_max.min(other.y_max);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x_min, self.y_min, self.x_max, self.y_max]
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        bbox.to_array()
    }
}

/// Detector output for one object, before danger classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Index into the model's class list
    pub class_id: usize,
    /// Class name as reported by the model
    pub class_label: String,
    /// Detection confidence [0, 1]
    pub confidence: f32,
    /// Box in the frame's native pixel coordinates
    pub bounding_box: BoundingBox,
}

impl RawDetection {
    pub fn new(
        class_id: usize,
        class_label: impl Into<String>,
        confidence: f32,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            class_id,
            class_label: class_label.into(),
            confidence,
            bounding_box,
        }
    }
}

/// A classified, localized object found in a frame.
///
/// Fields are read-only. The `dangerous` flag is computed once, when the
/// lexicon classifies the raw detection, and is never re-derived.
///
/// Wire format: `{ "animal", "confidence", "dangerous", "bbox": [x0, y0, x1, y1] }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "animal")]
    class_label: String,
    confidence: f32,
    dangerous: bool,
    #[serde(rename = "bbox")]
    bounding_box: BoundingBox,
}

impl Detection {
    pub(crate) fn new(raw: RawDetection, dangerous: bool) -> Self {
        Self {
            class_label: raw.class_label,
            confidence: raw.confidence,
            dangerous,
            bounding_box: raw.bounding_box,
        }
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn is_dangerous(&self) -> bool {
        self.dangerous
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }
}
