// ABOUTME: Container runtime port and its engine-backed implementations.
// ABOUTME: Single-host containers via bollard, cluster services via the service API.

mod bollard;
mod cluster;
mod error;
pub mod traits;
mod types;
mod workload;

pub use self::bollard::BollardRuntime;
pub use cluster::ClusterRuntime;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;
pub use types::{DEFAULT_SOCKET, RuntimeConfig, RuntimeMode, socket_from_docker_host};
pub use workload::{WorkloadInfo, WorkloadRuntime, WorkloadSpec};

use crate::model::RuntimeHandle;
use crate::types::ImageRef;
use async_trait::async_trait;
use std::time::Duration;

/// The runtime selected by configuration.
pub enum Runtime {
    SingleHost(BollardRuntime),
    Cluster(ClusterRuntime),
}

impl Runtime {
    /// Connect to the engine in the configured mode.
    pub fn connect(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let socket = config.socket_path();
        tracing::debug!(mode = %config.mode, socket, "connecting to container engine");
        match config.mode {
            RuntimeMode::SingleHost => BollardRuntime::connect(socket).map(Runtime::SingleHost),
            RuntimeMode::Cluster => ClusterRuntime::connect(socket).map(Runtime::Cluster),
        }
    }

    fn inner(&self) -> &dyn WorkloadRuntime {
        match self {
            Runtime::SingleHost(rt) => rt,
            Runtime::Cluster(rt) => rt,
        }
    }
}

#[async_trait]
impl WorkloadRuntime for Runtime {
    fn mode(&self) -> RuntimeMode {
        self.inner().mode()
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), RuntimeError> {
        self.inner().pull_image(image).await
    }

    async fn validate_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.inner().validate_network(name).await
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle, RuntimeError> {
        self.inner().create_workload(spec).await
    }

    async fn start(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        self.inner().start(handle, replicas).await
    }

    async fn stop(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        self.inner().stop(handle, timeout).await
    }

    async fn restart(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        self.inner().restart(handle, timeout).await
    }

    async fn remove(&self, handle: &RuntimeHandle, force: bool) -> Result<(), RuntimeError> {
        self.inner().remove(handle, force).await
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<WorkloadInfo, RuntimeError> {
        self.inner().inspect(handle).await
    }

    async fn logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> Result<ByteStream, RuntimeError> {
        self.inner().logs(handle, opts).await
    }

    async fn scale(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        self.inner().scale(handle, replicas).await
    }
}
