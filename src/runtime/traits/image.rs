// ABOUTME: Image operations trait shared by both runtime modes.
// ABOUTME: Pulls images so containers and cluster tasks start from a local copy.

use crate::types::ImageRef;
use async_trait::async_trait;

#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Pull an image from a registry, consuming the whole progress stream.
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("pull failed: {0}")]
    PullFailed(String),
}
