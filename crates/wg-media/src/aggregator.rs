//! Reduces per-frame detections to the reported set.

use std::collections::HashSet;

use wg_models::Detection;

/// Collects detections across the frames of one request.
///
/// Video mode only inspects frames on whole-second boundaries. Within a
/// sampled frame, dangerous classes are reported every time they appear and
/// benign classes only the first time. Image mode reports everything.
#[derive(Debug)]
pub struct DetectionAggregator {
    cadence: u64,
    seen: HashSet<String>,
    reported: Vec<Detection>,
}

impl DetectionAggregator {
    /// Create an aggregator sampling every `cadence` frames (minimum 1).
    pub fn new(cadence: u64) -> Self {
        Self {
            cadence: cadence.max(1),
            seen: HashSet::new(),
            reported: Vec::new(),
        }
    }

    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// Whether the 0-based frame index falls on a reporting boundary.
    pub fn is_sampled(&self, frame_index: u64) -> bool {
        frame_index % self.cadence == 0
    }

    /// Record the detections of one video frame.
    ///
    /// Frames off the sampling boundary are ignored.
    pub fn observe(&mut self, frame_index: u64, detections: Vec<Detection>) {
        if !self.is_sampled(frame_index) {
            return;
        }

        for detection in detections {
            let first_sighting = self.seen.insert(detection.class_label().to_string());
            if detection.is_dangerous() || first_sighting {
                self.reported.push(detection);
            }
        }
    }

    /// Record every detection of a single image without suppression.
    pub fn observe_all(&mut self, detections: Vec<Detection>) {
        for detection in &detections {
            self.seen.insert(detection.class_label().to_string());
        }
        self.reported.extend(detections);
    }

    pub fn len(&self) -> usize {
        self.reported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reported.is_empty()
    }

    /// Consume the aggregator, returning detections in report order.
    pub fn finish(self) -> Vec<Detection> {
        self.reported
    }
}
