//! Dangerous-class lexicon.
//!
//! A fixed, case-insensitive set of class names treated as safety-critical.
//! Built once at startup and shared read-only across requests.

use std::collections::HashSet;

use crate::detection::{Detection, RawDetection};

/// Classes flagged as dangerous unless overridden at startup.
pub const DEFAULT_DANGEROUS_CLASSES: &[&str] = &[
    "tiger",
    "lion",
    "bear",
    "elephant",
    "leopard",
    "cheetah",
    "wolf",
    "rhinoceros",
    "rhino",
    "hippo",
    "crocodile",
];

/// Case-insensitive set of dangerous class names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DangerLexicon {
    classes: HashSet<String>,
}

impl DangerLexicon {
    /// Build a lexicon from class names. Entries are trimmed and lower-cased;
    /// blank entries are ignored.
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes = classes
            .into_iter()
            .map(|c| c.as_ref().trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        Self { classes }
    }

    /// Build from `DANGEROUS_CLASSES` (comma separated), falling back to the
    /// default set when unset or empty.
    pub fn from_env() -> Self {
        match std::env::var("DANGEROUS_CLASSES") {
            Ok(value) if !value.trim().is_empty() => Self::new(value.split(',')),
            _ => Self::default(),
        }
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, class_label: &str) -> bool {
        self.classes.contains(&class_label.to_lowercase())
    }

    /// Flag a raw detection. This is the only way a [`Detection`] is created,
    /// so its `dangerous` flag always agrees with its label.
    pub fn classify(&self, raw: RawDetection) -> Detection {
        let dangerous = self.contains(&raw.class_label);
        Detection::new(raw, dangerous)
    }

    /// Flag a batch of raw detections, keeping detector order.
    pub fn classify_all(&self, raw: Vec<RawDetection>) -> Vec<Detection> {
        raw.into_iter().map(|r| self.classify(r)).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for DangerLexicon {
    fn default() -> Self {
        Self::new(DEFAULT_DANGEROUS_CLASSES)
    }
}
