//! Artifact storage for WildGuard.
//!
//! This crate provides:
//! - An S3-compatible client (Cloudflare R2, Supabase Storage, MinIO)
//! - Caller-scoped object keys safe against path traversal
//! - The [`ArtifactPublisher`] seam used to publish annotated videos

pub mod client;
pub mod error;
pub mod publisher;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use publisher::{scoped_key, ArtifactPublisher, StoragePublisher};
