//! API integration tests.
//!
//! The router runs against fake detector, codec and storage backends, so no
//! model, camera or bucket is needed.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{ImageOutputFormat, Rgb, RgbImage};
use serde_json::Value;
use tower::ServiceExt;

use wg_api::{create_router, ApiConfig, AppState, DetectionService};
use wg_media::{
    frame_part, Detector, DetectionSettings, FrameSink, FrameSource, MediaBackend, MediaError,
    MediaResult, VideoGeometry,
};
use wg_models::{BoundingBox, DangerLexicon, Detection, RawDetection};
use wg_storage::{scoped_key, ArtifactPublisher, StorageError, StorageResult};

const BOUNDARY: &str = "wgtestboundary";

/// Scene is read from the red channel of the top-left pixel:
/// 0 = tiger, 1 = tiger and deer, 2 = cat and tiger, 3 = detector failure.
struct SceneDetector;

impl Detector for SceneDetector {
    fn infer(&self, frame: &RgbImage, threshold: f32, _input_size: u32) -> MediaResult<Vec<RawDetection>> {
        let tiger = RawDetection::new(0, "tiger", 0.6, BoundingBox::new(12.0, 8.0, 48.0, 40.0));
        let mut found = match frame.get_pixel(0, 0)[0] {
            0 => vec![tiger],
            1 => vec![
                tiger,
                RawDetection::new(1, "deer", 0.7, BoundingBox::new(50.0, 4.0, 70.0, 30.0)),
            ],
            3 => return Err(MediaError::inference_failed("detector crashed")),
            _ => vec![
                RawDetection::new(2, "cat", 0.9, BoundingBox::new(2.0, 3.0, 30.0, 33.0)),
                tiger,
            ],
        };
        found.retain(|d| d.confidence >= threshold);
        Ok(found)
    }
}

struct VecSource {
    geometry: VideoGeometry,
    frames: std::vec::IntoIter<RgbImage>,
}

impl FrameSource for VecSource {
    fn geometry(&self) -> VideoGeometry {
        self.geometry
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        self.frames.next()
    }
}

/// Appends a marker per frame so the output is non-empty.
struct FileSink {
    file: std::fs::File,
}

impl FrameSink for FileSink {
    fn write_frame(&mut self, _frame: &RgbImage, detections: &[Detection]) -> MediaResult<()> {
        writeln!(self.file, "frame {}", detections.len())?;
        Ok(())
    }

    fn finish(&mut self) -> MediaResult<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Video clip of `seconds` at 30 fps with a deer during second 1.
struct FakeBackend {
    width: u32,
    seconds: u64,
    camera_frames: usize,
    /// Frame index at which decoding stops, as with a corrupt frame
    decode_fails_at: Option<u64>,
    /// Second whose frames make the detector fail
    detector_fails_in: Option<u64>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            width: 80,
            seconds: 3,
            camera_frames: 2,
            decode_fails_at: None,
            detector_fails_in: None,
        }
    }
}

impl MediaBackend for FakeBackend {
    fn open_video(&self, _path: &Path, default_fps: f64) -> MediaResult<Box<dyn FrameSource>> {
        let geometry = VideoGeometry::new(self.width, 48, 30.0, default_fps)?;
        let decodable = self.decode_fails_at.unwrap_or(u64::MAX).min(self.seconds * 30);
        let frames: Vec<RgbImage> = (0..decodable)
            .map(|i| {
                let second = i / 30;
                let scene = if self.detector_fails_in == Some(second) {
                    3
                } else {
                    u8::from(second == 1)
                };
                RgbImage::from_pixel(self.width, 48, Rgb([scene, 0, 0]))
            })
            .collect();
        Ok(Box::new(VecSource {
            geometry,
            frames: frames.into_iter(),
        }))
    }

    fn open_writer(&self, path: &Path, _geometry: VideoGeometry) -> MediaResult<Box<dyn FrameSink>> {
        let file = std::fs::File::create(path)
            .map_err(|e| MediaError::encoder_unavailable(e.to_string()))?;
        Ok(Box::new(FileSink { file }))
    }

    fn open_camera(&self, _index: i32, width: u32, height: u32) -> MediaResult<Box<dyn FrameSource>> {
        let frames = vec![RgbImage::new(width, height); self.camera_frames];
        Ok(Box::new(VecSource {
            geometry: VideoGeometry::new(width, height, 30.0, 30.0)?,
            frames: frames.into_iter(),
        }))
    }

    fn encode_jpeg(&self, _frame: &RgbImage, _detections: &[Detection]) -> MediaResult<Vec<u8>> {
        Ok(b"jpeg".to_vec())
    }
}

/// Records (path, caller, bytes on disk) per publish.
#[derive(Clone, Default)]
struct FakePublisher {
    fail: bool,
    calls: Arc<Mutex<Vec<(PathBuf, String, u64)>>>,
}

#[async_trait]
impl ArtifactPublisher for FakePublisher {
    async fn publish(&self, local_path: &Path, caller_id: &str) -> StorageResult<String> {
        let size = std::fs::metadata(local_path).map(|m| m.len()).unwrap_or(0);
        self.calls
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), caller_id.to_string(), size));
        if self.fail {
            return Err(StorageError::upload_failed("bucket unreachable"));
        }
        let filename = local_path.file_name().unwrap().to_str().unwrap();
        Ok(format!("https://cdn.test/{}", scoped_key(caller_id, filename)?))
    }
}

fn test_router(
    scratch: &Path,
    with_model: bool,
    backend: FakeBackend,
    publisher: Option<FakePublisher>,
) -> Router {
    let config = ApiConfig {
        scratch_dir: scratch.to_path_buf(),
        ..ApiConfig::default()
    };
    router_with_config(config, with_model, backend, publisher)
}

fn router_with_config(
    config: ApiConfig,
    with_model: bool,
    backend: FakeBackend,
    publisher: Option<FakePublisher>,
) -> Router {
    let scratch = config.scratch_dir.clone();
    let detector = with_model.then(|| Arc::new(SceneDetector) as Arc<dyn Detector>);
    let publisher = publisher.map(|p| Arc::new(p) as Arc<dyn ArtifactPublisher>);
    let service = DetectionService::new(
        detector,
        Arc::new(DangerLexicon::default()),
        Arc::new(backend),
        publisher,
        DetectionSettings::default(),
        scratch,
    );
    create_router(AppState::from_parts(config, service), None)
}

fn png_bytes(scene: u8) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(64, 64, Rgb([scene, 0, 0]))
        .write_to(&mut out, ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Build a multipart request; parts are (field name, optional filename, data).
fn detect_request(parts: Vec<(&str, Option<&str>, Vec<u8>)>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(&data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/detect")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

fn count_animal(body: &Value, animal: &str) -> usize {
    body["detections"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|d| d["animal"] == animal)
        .count()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), true, FakeBackend::default(), None);

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_model_state() {
    let scratch = tempfile::tempdir().unwrap();

    let app = test_router(scratch.path(), true, FakeBackend::default(), Some(FakePublisher::default()));
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let app = test_router(scratch.path(), false, FakeBackend::default(), None);
    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["model"]["status"], "error");
    assert_eq!(body["checks"]["storage"]["status"], "disabled");
}

#[tokio::test]
async fn test_image_reports_every_object() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::default();
    let app = test_router(scratch.path(), true, FakeBackend::default(), Some(publisher.clone()));

    let png = png_bytes(2);
    let response = app
        .oneshot(detect_request(vec![("file", Some("cat.jpg"), png)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "success");
    assert_eq!(body["type"], "image");
    assert_eq!(body["count"], 2);
    assert!(body["video_url"].is_null());

    let detections = body["detections"].as_array().unwrap();
    assert_eq!(detections[0]["animal"], "cat");
    assert_eq!(detections[0]["dangerous"], false);
    assert_eq!(detections[0]["bbox"], serde_json::json!([2.0, 3.0, 30.0, 33.0]));
    assert_eq!(detections[1]["animal"], "tiger");
    assert_eq!(detections[1]["dangerous"], true);

    assert!(publisher.calls.lock().unwrap().is_empty());
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_video_samples_once_per_second() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::default();
    let app = test_router(scratch.path(), true, FakeBackend::default(), Some(publisher.clone()));

    let response = app
        .oneshot(detect_request(vec![
            ("user_id", None, b"ranger-7".to_vec()),
            ("file", Some("clip.mp4"), b"not decoded by the fake backend".to_vec()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["type"], "video");
    assert_eq!(count_animal(&body, "tiger"), 3);
    assert_eq!(count_animal(&body, "deer"), 1);
    assert_eq!(body["count"], 4);

    let url = body["video_url"].as_str().unwrap();
    assert!(url.starts_with("https://cdn.test/ranger-7/processed_"));
    assert!(url.ends_with(".webm"));

    let calls = publisher.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "ranger-7");
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_video_publish_failure_still_succeeds() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher {
        fail: true,
        ..Default::default()
    };
    let app = test_router(scratch.path(), true, FakeBackend::default(), Some(publisher.clone()));

    let response = app
        .oneshot(detect_request(vec![("file", Some("Clip.MKV"), b"container".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["message"], "success");
    assert_eq!(body["type"], "video");
    assert!(body["video_url"].is_null());
    assert!(!body["detections"].as_array().unwrap().is_empty());

    assert_eq!(publisher.calls.lock().unwrap()[0].1, "unknown");
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_video_decode_failure_keeps_partial_output() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::default();
    let backend = FakeBackend {
        decode_fails_at: Some(45),
        ..Default::default()
    };
    let app = test_router(scratch.path(), true, backend, Some(publisher.clone()));

    let response = app
        .oneshot(detect_request(vec![("file", Some("clip.mp4"), b"container".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(count_animal(&body, "tiger"), 2);
    assert_eq!(count_animal(&body, "deer"), 1);
    assert!(body["video_url"].as_str().unwrap().ends_with(".webm"));

    let calls = publisher.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    // 45 frames at "frame N\n" each
    assert_eq!(calls[0].2, 45 * "frame 1\n".len() as u64);
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_detector_failure_mid_video_removes_output() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::default();
    let backend = FakeBackend {
        detector_fails_in: Some(1),
        ..Default::default()
    };
    let app = test_router(scratch.path(), true, backend, Some(publisher.clone()));

    let response = app
        .oneshot(detect_request(vec![("file", Some("clip.mp4"), b"container".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("detector crashed"));
    assert!(publisher.calls.lock().unwrap().is_empty());
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        scratch_dir: scratch.path().to_path_buf(),
        max_body_size: 1024,
        ..ApiConfig::default()
    };
    let app = router_with_config(config, true, FakeBackend::default(), None);

    let response = app
        .oneshot(detect_request(vec![("file", Some("big.mp4"), vec![0u8; 4096])]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_corrupt_video_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let publisher = FakePublisher::default();
    let backend = FakeBackend {
        width: 0,
        ..Default::default()
    };
    let app = test_router(scratch.path(), true, backend, Some(publisher.clone()));

    let response = app
        .oneshot(detect_request(vec![("file", Some("broken.avi"), b"garbage".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("dimensions"));
    assert!(publisher.calls.lock().unwrap().is_empty());
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_undecodable_image_is_rejected() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), true, FakeBackend::default(), None);

    let response = app
        .oneshot(detect_request(vec![("file", Some("photo.png"), b"not an image".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("decode"));
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_missing_file_field() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), true, FakeBackend::default(), None);

    let response = app
        .oneshot(detect_request(vec![("user_id", None, b"ranger-7".to_vec())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No file");
}

#[tokio::test]
async fn test_model_offline() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), false, FakeBackend::default(), None);

    let png = png_bytes(2);
    let response = app
        .oneshot(detect_request(vec![("file", Some("cat.png"), png)]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Model offline");
    assert!(scratch_is_empty(scratch.path()));
}

#[tokio::test]
async fn test_video_feed_streams_parts() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), true, FakeBackend::default(), None);

    let response = app
        .oneshot(Request::builder().uri("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut expected = frame_part(b"jpeg");
    expected.extend(frame_part(b"jpeg"));
    assert_eq!(bytes.to_vec(), expected);
}

#[tokio::test]
async fn test_video_feed_requires_model() {
    let scratch = tempfile::tempdir().unwrap();
    let app = test_router(scratch.path(), false, FakeBackend::default(), None);

    let response = app
        .oneshot(Request::builder().uri("/video_feed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
