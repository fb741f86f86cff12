//! Object detection using a YOLOv8 ONNX model.
//!
//! Provides the production [`Detector`] with GPU acceleration support:
//! - CUDA on Linux with NVIDIA GPU
//! - CoreML on macOS with Apple Silicon
//! - CPU fallback on all platforms
//!
//! The model is loaded once at startup. ONNX graphs carry no host-specific
//! state, so loading the same file works on every platform.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info, warn};
use wg_models::{BoundingBox, RawDetection};

use crate::detector::{validate_request, Detector};
use crate::error::{MediaError, MediaResult};

/// COCO class names (80 classes), used when no label file is configured.
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Configuration for object detection.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Preferred model (custom-trained wildlife weights)
    pub model_path: String,
    /// Stock model used when the preferred one is missing
    pub fallback_model_path: String,
    /// Optional file with one class label per line
    pub labels_path: Option<String>,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Name of the detection output tensor
    pub output_name: String,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/best.onnx".to_string(),
            fallback_model_path: "models/yolov8n.onnx".to_string(),
            labels_path: None,
            nms_threshold: 0.45,
            output_name: "output0".to_string(),
        }
    }
}

impl ObjectDetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_path: std::env::var("MODEL_PATH").unwrap_or(defaults.model_path),
            fallback_model_path: std::env::var("MODEL_FALLBACK_PATH")
                .unwrap_or(defaults.fallback_model_path),
            labels_path: std::env::var("MODEL_LABELS_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            nms_threshold: std::env::var("NMS_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.nms_threshold),
            output_name: defaults.output_name,
        }
    }

    /// Pick the preferred model when present, otherwise the fallback.
    pub fn resolve_model_path(&self) -> MediaResult<PathBuf> {
        let preferred = Path::new(&self.model_path);
        if preferred.exists() {
            return Ok(preferred.to_path_buf());
        }

        let fallback = Path::new(&self.fallback_model_path);
        if fallback.exists() {
            warn!(
                preferred = %self.model_path,
                fallback = %self.fallback_model_path,
                "Preferred model missing, using fallback"
            );
            return Ok(fallback.to_path_buf());
        }

        Err(MediaError::model_not_found(format!(
            "{} (fallback {})",
            self.model_path, self.fallback_model_path
        )))
    }
}

/// Object detector using a YOLOv8 ONNX model.
///
/// Uses ONNX Runtime for inference with automatic execution provider selection:
/// - CUDA on Linux with NVIDIA GPU (when `cuda` feature enabled)
/// - CoreML on macOS
/// - CPU fallback on all platforms
pub struct ObjectDetector {
    session: Mutex<Session>,
    config: ObjectDetectorConfig,
    labels: Vec<String>,
}

impl ObjectDetector {
    /// Create a new object detector from config.
    ///
    /// Returns error if no model file exists or it cannot be loaded.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        let model_path = config.resolve_model_path()?;

        let labels = match &config.labels_path {
            Some(path) => load_labels(Path::new(path))?,
            None => COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
        };

        let session = Mutex::new(create_session(&model_path)?);
        info!(
            model_path = %model_path.display(),
            classes = labels.len(),
            "Object detector initialized"
        );

        Ok(Self {
            session,
            config,
            labels,
        })
    }

    /// Preprocess image for YOLOv8 inference.
    ///
    /// - Resize to model input size (square)
    /// - Normalize pixel values to [0, 1]
    /// - Convert to NCHW format (batch, channels, height, width)
    fn preprocess(&self, frame: &RgbImage, input_size: u32) -> MediaResult<Value> {
        let resized = image::imageops::resize(frame, input_size, input_size, FilterType::Triangle);
        let (w, h) = (input_size as usize, input_size as usize);

        let mut chw_data: Vec<f32> = Vec::with_capacity(3 * h * w);
        for c in 0..3 {
            for y in 0..h {
                for x in 0..w {
                    let pixel = resized.get_pixel(x as u32, y as u32);
                    chw_data.push(pixel[c] as f32 / 255.0);
                }
            }
        }

        let shape = vec![1usize, 3, h, w];
        Tensor::from_array((shape, chw_data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::inference_failed(format!("Failed to create tensor: {}", e)))
    }

    /// Run ONNX inference, returning the output shape and its data.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<i64>, Vec<f32>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::inference_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get(self.config.output_name.as_str())
            .ok_or_else(|| {
                MediaError::inference_failed(format!("Missing {} tensor", self.config.output_name))
            })?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::inference_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok((shape.iter().copied().collect(), data.to_vec()))
    }

    /// Postprocess YOLOv8 output.
    ///
    /// YOLOv8 output format: [1, 4 + num_classes, num_boxes]
    /// - 4 = bbox (cx, cy, w, h) in model input coordinates
    /// - then one score per class
    fn postprocess(
        &self,
        shape: &[i64],
        outputs: &[f32],
        orig_width: u32,
        orig_height: u32,
        confidence_threshold: f32,
        input_size: u32,
    ) -> MediaResult<Vec<RawDetection>> {
        let num_classes = self.labels.len();
        let num_features = 4 + num_classes;
        let num_boxes = check_output_shape(shape, outputs.len(), num_classes)?;

        // Output is [num_features, num_boxes]; transpose to [num_boxes, num_features]
        let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
            .map_err(|e| MediaError::inference_failed(format!("Failed to reshape output: {}", e)))?;
        let transposed = output_array.t();

        let scale_w = orig_width as f32 / input_size as f32;
        let scale_h = orig_height as f32 / input_size as f32;

        let mut candidates: Vec<RawDetection> = Vec::new();

        for i in 0..num_boxes {
            let cx = transposed[[i, 0]];
            let cy = transposed[[i, 1]];
            let w = transposed[[i, 2]];
            let h = transposed[[i, 3]];

            let mut best_class = 0;
            let mut best_score = 0.0f32;
            for c in 0..num_classes {
                let score = transposed[[i, 4 + c]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }

            if best_score < confidence_threshold {
                continue;
            }

            // Center format -> corner format, scaled back to the frame
            let bbox = BoundingBox::new(
                (cx - w / 2.0) * scale_w,
                (cy - h / 2.0) * scale_h,
                (cx + w / 2.0) * scale_w,
                (cy + h / 2.0) * scale_h,
            )
            .clamp_to(orig_width, orig_height);

            if bbox.is_degenerate() {
                continue;
            }

            candidates.push(RawDetection::new(
                best_class,
                self.labels[best_class].clone(),
                best_score,
                bbox,
            ));
        }

        Ok(non_maximum_suppression(candidates, self.config.nms_threshold))
    }
}

impl Detector for ObjectDetector {
    fn infer(
        &self,
        frame: &RgbImage,
        confidence_threshold: f32,
        input_size: u32,
    ) -> MediaResult<Vec<RawDetection>> {
        validate_request(frame, confidence_threshold, input_size)?;

        let input = self.preprocess(frame, input_size)?;
        let (shape, outputs) = self.run_inference(input)?;
        let detections = self.postprocess(
            &shape,
            &outputs,
            frame.width(),
            frame.height(),
            confidence_threshold,
            input_size,
        )?;

        debug!(count = detections.len(), "Object detection completed");
        Ok(detections)
    }
}

/// Validate a YOLOv8 head against the label set, returning the box count.
///
/// The head must be `[1, 4 + num_classes, num_boxes]`; a label file that does
/// not match the model is rejected rather than misread.
pub fn check_output_shape(shape: &[i64], len: usize, num_classes: usize) -> MediaResult<usize> {
    let expected_features = 4 + num_classes as i64;
    match shape {
        [1, features, boxes] if *features == expected_features && *boxes > 0 => {
            let num_boxes = *boxes as usize;
            if len != (expected_features as usize) * num_boxes {
                return Err(MediaError::inference_failed(format!(
                    "Output has {} values, shape {:?} needs {}",
                    len,
                    shape,
                    expected_features as usize * num_boxes
                )));
            }
            Ok(num_boxes)
        }
        _ => Err(MediaError::inference_failed(format!(
            "Unexpected output shape {:?}, expected [1, {}, N] for {} classes",
            shape, expected_features, num_classes
        ))),
    }
}

/// Apply per-class Non-Maximum Suppression, keeping the most confident box.
///
/// The result is ordered by descending confidence.
pub fn non_maximum_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }
            if detections[i].bounding_box.iou(&detections[j].bounding_box) > iou_threshold {
                suppressed[j] = true;
            }
        }

        keep.push(detections[i].clone());
    }

    keep
}

/// Read class labels, one per line. Blank lines are skipped.
pub fn load_labels(path: &Path) -> MediaResult<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MediaError::model_unavailable(format!("Failed to read labels {}: {}", path.display(), e)))?;

    let labels: Vec<String> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
        .collect();

    if labels.is_empty() {
        return Err(MediaError::model_unavailable(format!(
            "Label file {} is empty",
            path.display()
        )));
    }

    Ok(labels)
}

/// Create ONNX Runtime session with automatic execution provider selection.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::model_unavailable(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::model_unavailable(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::model_unavailable(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!("Using CoreML execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CoreML execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::model_unavailable(format!("Failed to load ONNX model: {}", e)))
}
