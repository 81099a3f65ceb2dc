// ABOUTME: Replicated-service operations for a cluster-mode runtime.
// ABOUTME: Works on a declarative replica count instead of a single container.

use super::logs::{ByteStream, LogOptions};
use super::shared_types::{ClusterServiceInfo, ContainerConfig};
use crate::types::ClusterServiceId;
use async_trait::async_trait;

#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Create a replicated service running `config` on `replicas` tasks.
    async fn create_service(
        &self,
        config: &ContainerConfig,
        replicas: u64,
    ) -> Result<ClusterServiceId, ClusterError>;

    async fn remove_service(&self, id: &ClusterServiceId) -> Result<(), ClusterError>;

    /// Change the desired replica count, keeping the rest of the spec.
    async fn scale_service(&self, id: &ClusterServiceId, replicas: u64)
    -> Result<(), ClusterError>;

    /// Force a rolling replacement of every task without changing the spec.
    async fn restart_service(&self, id: &ClusterServiceId) -> Result<(), ClusterError>;

    async fn inspect_service(&self, id: &ClusterServiceId)
    -> Result<ClusterServiceInfo, ClusterError>;

    /// Stream the aggregated logs of every task.
    async fn service_logs(
        &self,
        id: &ClusterServiceId,
        opts: &LogOptions,
    ) -> Result<ByteStream, ClusterError>;
}

/// Errors from cluster operations.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("cluster service not found: {0}")]
    NotFound(String),

    #[error("cluster service already exists: {0}")]
    AlreadyExists(String),

    #[error("node is not part of a cluster: {0}")]
    NotClustered(String),

    #[error("invalid log options: {0}")]
    Logs(#[from] super::logs::LogError),

    #[error("runtime error: {0}")]
    Runtime(String),
}
