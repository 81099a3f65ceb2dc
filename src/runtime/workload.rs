// ABOUTME: Mode-neutral workload port used by the orchestrator.
// ABOUTME: A workload is a container on a single host or a replicated service in a cluster.

use async_trait::async_trait;
use std::time::Duration;

use super::error::RuntimeError;
use super::traits::{ByteStream, ContainerConfig, LogOptions};
use super::types::RuntimeMode;
use crate::model::RuntimeHandle;
use crate::types::ImageRef;

/// Everything needed to create a workload.
#[derive(Debug, Clone)]
pub struct WorkloadSpec {
    pub config: ContainerConfig,
    /// Desired replicas. Single-host runtimes always run exactly one.
    pub replicas: u32,
}

/// Observed state of a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadInfo {
    /// Short machine-friendly state, e.g. `running`, `exited`, `scaled-down`.
    pub state: String,
    /// Human-readable detail, e.g. `exited (1)` or `2 replicas`.
    pub status: String,
}

/// The operations the orchestrator needs from a container engine.
///
/// Errors are returned as the engine reported them; nothing here retries.
#[async_trait]
pub trait WorkloadRuntime: Send + Sync + 'static {
    fn mode(&self) -> RuntimeMode;

    /// Pull an image so the workload can start from a local copy.
    async fn pull_image(&self, image: &ImageRef) -> Result<(), RuntimeError>;

    /// Fail unless the named network exists.
    async fn validate_network(&self, name: &str) -> Result<(), RuntimeError>;

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle, RuntimeError>;

    /// Start a workload. Cluster services are scaled to `replicas`.
    async fn start(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError>;

    /// Stop a workload. Cluster services are scaled to zero.
    async fn stop(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError>;

    async fn restart(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError>;

    async fn remove(&self, handle: &RuntimeHandle, force: bool) -> Result<(), RuntimeError>;

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<WorkloadInfo, RuntimeError>;

    async fn logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> Result<ByteStream, RuntimeError>;

    /// Change the replica count of a running workload.
    async fn scale(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError>;
}
