//! Publishing annotated artifacts under caller-scoped keys.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use tracing::info;

use crate::client::R2Client;
use crate::error::{StorageError, StorageResult};

/// Histogram of artifact upload durations.
pub const UPLOAD_DURATION_SECONDS: &str = "wg_upload_duration_seconds";

/// Namespace used when the caller supplies no identifier.
pub const DEFAULT_CALLER_ID: &str = "unknown";

/// Stores a local artifact remotely and returns its public URL.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, local_path: &Path, caller_id: &str) -> StorageResult<String>;

    /// Verify the remote store is reachable.
    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Build the object key `<caller>/<filename>`.
///
/// The caller id is untrusted: it is percent-encoded into a single segment,
/// so it cannot add path components or climb out of its namespace.
pub fn scoped_key(caller_id: &str, filename: &str) -> StorageResult<String> {
    if filename.is_empty() || filename.contains(['/', '\\']) || filename.chars().all(|c| c == '.') {
        return Err(StorageError::invalid_key(format!("bad artifact filename {:?}", filename)));
    }

    let segment = if caller_id.is_empty() {
        DEFAULT_CALLER_ID.to_string()
    } else if caller_id.chars().all(|c| c == '.') {
        "%2E".repeat(caller_id.len())
    } else {
        urlencoding::encode(caller_id).into_owned()
    };

    Ok(format!("{}/{}", segment, filename))
}

/// Publisher backed by an S3-compatible bucket.
#[derive(Clone)]
pub struct StoragePublisher {
    client: R2Client,
    content_type: String,
}

impl StoragePublisher {
    pub fn new(client: R2Client, content_type: impl Into<String>) -> Self {
        Self {
            client,
            content_type: content_type.into(),
        }
    }
}

#[async_trait]
impl ArtifactPublisher for StoragePublisher {
    async fn publish(&self, local_path: &Path, caller_id: &str) -> StorageResult<String> {
        let filename = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::invalid_key(local_path.display().to_string()))?;
        let key = scoped_key(caller_id, filename)?;

        let start = Instant::now();
        self.client
            .upload_file(local_path, &key, &self.content_type)
            .await?;
        histogram!(UPLOAD_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        let url = self.client.public_url(&key);
        info!(key = %key, url = %url, "Artifact published");
        Ok(url)
    }

    async fn check(&self) -> StorageResult<()> {
        self.client.check_connectivity().await
    }
}
