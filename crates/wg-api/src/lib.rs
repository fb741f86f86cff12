//! Axum HTTP API server.
//!
//! This crate provides:
//! - Image and video detection uploads (`POST /detect`)
//! - An annotated live camera preview (`GET /video_feed`)
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{DetectionService, Upload};
pub use state::AppState;
