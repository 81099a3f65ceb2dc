// ABOUTME: Network lookup trait for container runtimes.
// ABOUTME: Used to confirm the reverse proxy's shared network exists before attaching.

use async_trait::async_trait;

#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;

    /// Fail with [`NetworkError::NotFound`] unless the named network exists.
    async fn validate_network(&self, name: &str) -> Result<(), NetworkError> {
        if self.network_exists(name).await? {
            Ok(())
        } else {
            Err(NetworkError::NotFound(name.to_string()))
        }
    }
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
