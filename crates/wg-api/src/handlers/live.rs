//! Live camera preview handler.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tracing::info;
use wg_media::multipart_content_type;

use crate::error::ApiResult;
use crate::state::AppState;

/// Stream annotated camera frames as `multipart/x-mixed-replace`.
///
/// The producer stops once this response body is dropped.
pub async fn video_feed(State(state): State<AppState>) -> ApiResult<Response> {
    let feed = state.detection.live_feed()?;
    let (rx, _producer) = feed.spawn();
    info!("Live feed client connected");

    let parts = stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|part| (Ok::<_, Infallible>(Bytes::from(part)), rx))
    });

    Ok((
        [
            (header::CONTENT_TYPE, multipart_content_type()),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        Body::from_stream(parts),
    )
        .into_response())
}
