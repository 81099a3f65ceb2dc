// ABOUTME: Bollard-based single-host runtime implementation.
// ABOUTME: Runs each service as one container through the Docker Engine API.

use crate::model::{RestartPolicy, RuntimeHandle};
use crate::runtime::error::RuntimeError;
use crate::runtime::traits::{
    ByteStream, ContainerConfig, ContainerError, ContainerInfo, ContainerOps, ContainerState,
    ImageError, ImageOps, LogError, LogOps, LogOptions, MountSource, NetworkError, NetworkOps,
};
use crate::runtime::types::RuntimeMode;
use crate::runtime::workload::{WorkloadInfo, WorkloadRuntime, WorkloadSpec};
use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, NetworkingConfig,
    PortBinding, RestartPolicy as EngineRestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, LogsOptions,
    RemoveContainerOptions, RestartContainerOptions, StopContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> ImageError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. }
            if *status_code == 404 =>
        {
            ImageError::NotFound(image_name.to_string())
        }
        _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::ImageNotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ContainerError::AlreadyExists(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::AlreadyRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_stop_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 304 => ContainerError::NotRunning(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_not_found_error(e: bollard::errors::Error) -> ContainerError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ContainerError::NotFound(message.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_log_error(e: bollard::errors::Error) -> LogError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => LogError::NotFound(message.clone()),
        _ => LogError::StreamError(e.to_string()),
    }
}

fn timeout_secs(timeout: Option<Duration>) -> Option<i32> {
    timeout.map(|d| i32::try_from(d.as_secs()).unwrap_or(i32::MAX))
}

fn engine_restart_policy(policy: RestartPolicy) -> EngineRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicy::OnFailure { max_retries } => (
            RestartPolicyNameEnum::ON_FAILURE,
            max_retries.map(i64::from),
        ),
    };
    EngineRestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

pub(crate) fn engine_mount(source: &MountSource, target: &str) -> Mount {
    let (typ, source) = match source {
        MountSource::Bind(path) => (MountTypeEnum::BIND, path),
        MountSource::Named(name) => (MountTypeEnum::VOLUME, name),
    };
    Mount {
        source: Some(source.clone()),
        target: Some(target.to_string()),
        typ: Some(typ),
        ..Default::default()
    }
}

pub(crate) fn connect_client(socket_path: &str) -> Result<Docker, RuntimeError> {
    Docker::connect_with_unix(socket_path, 120, bollard::API_DEFAULT_VERSION).map_err(|e| {
        RuntimeError::Connection {
            message: format!("{}: {}", socket_path, e),
        }
    })
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Single-host runtime: one container per service.
#[derive(Clone)]
pub struct BollardRuntime {
    client: Docker,
}

impl BollardRuntime {
    /// Create a new BollardRuntime from a Docker client.
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to the engine listening on a unix socket.
    pub fn connect(socket_path: &str) -> Result<Self, RuntimeError> {
        connect_client(socket_path).map(Self::new)
    }

    pub(crate) fn client(&self) -> &Docker {
        &self.client
    }

    fn container_id<'a>(&self, handle: &'a RuntimeHandle) -> Result<&'a ContainerId, RuntimeError> {
        match handle {
            RuntimeHandle::Container(id) => Ok(id),
            other => Err(RuntimeError::HandleMismatch {
                handle: other.clone(),
                mode: RuntimeMode::SingleHost,
            }),
        }
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let image_name = reference.to_string();

        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, &image_name))?;
        }

        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let labels: HashMap<String, String> = config
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut host_config = HostConfig {
            restart_policy: Some(engine_restart_policy(config.restart_policy)),
            memory: config.resources.memory_bytes(),
            nano_cpus: config.resources.nano_cpus(),
            ..Default::default()
        };

        let mounts: Vec<Mount> = config
            .volumes
            .iter()
            .map(|m| engine_mount(&m.source, &m.target))
            .collect();
        if !mounts.is_empty() {
            host_config.mounts = Some(mounts);
        }

        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        let mut exposed_ports: Vec<String> = Vec::new();
        for port in &config.ports {
            let port_key = port.port_key();
            exposed_ports.push(port_key.clone());

            if let Some(host_port) = port.host_port {
                port_bindings.insert(
                    port_key,
                    Some(vec![PortBinding {
                        host_ip: None,
                        host_port: Some(host_port.to_string()),
                    }]),
                );
            }
        }
        if !port_bindings.is_empty() {
            host_config.port_bindings = Some(port_bindings);
        }

        let networking_config = config.network.as_ref().map(|network| {
            let mut endpoints: HashMap<String, EndpointSettings> = HashMap::new();
            endpoints.insert(network.clone(), EndpointSettings::default());
            NetworkingConfig {
                endpoints_config: Some(endpoints),
            }
        });

        let container_config = ContainerCreateBody {
            image: Some(config.image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            labels: if labels.is_empty() {
                None
            } else {
                Some(labels)
            },
            host_config: Some(host_config),
            exposed_ports: if exposed_ports.is_empty() {
                None
            } else {
                Some(exposed_ports)
            },
            networking_config,
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(config.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), container_config)
            .await
            .map_err(map_container_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.client
            .start_container(
                id.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(map_container_start_error)
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), ContainerError> {
        let opts = StopContainerOptions {
            t: timeout_secs(timeout),
            signal: None,
        };

        self.client
            .stop_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_stop_error)
    }

    async fn restart_container(
        &self,
        id: &ContainerId,
        timeout: Option<Duration>,
    ) -> Result<(), ContainerError> {
        let opts = RestartContainerOptions {
            t: timeout_secs(timeout),
            ..Default::default()
        };

        self.client
            .restart_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn remove_container(&self, id: &ContainerId, force: bool) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(id.as_str(), Some(opts))
            .await
            .map_err(map_container_not_found_error)
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        let details = self
            .client
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(map_container_not_found_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(|s| match s {
                bollard::models::ContainerStateStatusEnum::CREATED => ContainerState::Created,
                bollard::models::ContainerStateStatusEnum::RUNNING => ContainerState::Running,
                bollard::models::ContainerStateStatusEnum::PAUSED => ContainerState::Paused,
                bollard::models::ContainerStateStatusEnum::RESTARTING => ContainerState::Restarting,
                bollard::models::ContainerStateStatusEnum::REMOVING => ContainerState::Removing,
                bollard::models::ContainerStateStatusEnum::EXITED => ContainerState::Exited,
                bollard::models::ContainerStateStatusEnum::DEAD => ContainerState::Dead,
                _ => ContainerState::Exited,
            })
            .unwrap_or(ContainerState::Exited);

        let exit_code = details.state.as_ref().and_then(|s| s.exit_code);

        Ok(ContainerInfo {
            id: id.clone(),
            state,
            exit_code,
        })
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(
                name,
                None::<bollard::query_parameters::InspectNetworkOptions>,
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }
}

#[async_trait]
impl LogOps for BollardRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        opts: &LogOptions,
    ) -> Result<ByteStream, LogError> {
        let since = opts.since_unix(chrono::Utc::now())?.unwrap_or_default();
        let log_opts = LogsOptions {
            stdout: true,
            stderr: true,
            follow: opts.follow,
            tail: opts.tail_param()?,
            // Zero means no lower bound.
            since: since.try_into().unwrap_or_default(),
            ..Default::default()
        };

        let stream = self.client.logs(id.as_str(), Some(log_opts));

        let mapped_stream = stream.map(|result| {
            result
                .map(|output| match output {
                    bollard::container::LogOutput::StdOut { message }
                    | bollard::container::LogOutput::StdErr { message }
                    | bollard::container::LogOutput::StdIn { message }
                    | bollard::container::LogOutput::Console { message } => message,
                })
                .map_err(map_log_error)
        });

        Ok(Box::pin(mapped_stream))
    }
}

#[async_trait]
impl WorkloadRuntime for BollardRuntime {
    fn mode(&self) -> RuntimeMode {
        RuntimeMode::SingleHost
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), RuntimeError> {
        Ok(ImageOps::pull_image(self, image).await?)
    }

    async fn validate_network(&self, name: &str) -> Result<(), RuntimeError> {
        Ok(NetworkOps::validate_network(self, name).await?)
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle, RuntimeError> {
        if spec.replicas != 1 {
            tracing::debug!(
                name = %spec.config.name,
                replicas = spec.replicas,
                "single-host mode runs one container per service"
            );
        }
        let id = self.create_container(&spec.config).await?;
        Ok(RuntimeHandle::Container(id))
    }

    async fn start(&self, handle: &RuntimeHandle, _replicas: u32) -> Result<(), RuntimeError> {
        let id = self.container_id(handle)?;
        Ok(self.start_container(id).await?)
    }

    async fn stop(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        let id = self.container_id(handle)?;
        Ok(self.stop_container(id, timeout).await?)
    }

    async fn restart(
        &self,
        handle: &RuntimeHandle,
        timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        let id = self.container_id(handle)?;
        Ok(self.restart_container(id, timeout).await?)
    }

    async fn remove(&self, handle: &RuntimeHandle, force: bool) -> Result<(), RuntimeError> {
        let id = self.container_id(handle)?;
        Ok(self.remove_container(id, force).await?)
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<WorkloadInfo, RuntimeError> {
        let id = self.container_id(handle)?;
        let info = self.inspect_container(id).await?;
        Ok(WorkloadInfo {
            state: info.state.to_string(),
            status: info.status(),
        })
    }

    async fn logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> Result<ByteStream, RuntimeError> {
        let id = self.container_id(handle)?;
        Ok(self.container_logs(id, opts).await?)
    }

    async fn scale(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        self.container_id(handle)?;
        if replicas == 1 {
            return Ok(());
        }
        Err(RuntimeError::Unsupported {
            operation: "scaling beyond one replica",
            mode: RuntimeMode::SingleHost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::traits::VolumeMount;

    #[test]
    fn restart_policy_maps_to_engine_names() {
        let policy = engine_restart_policy(RestartPolicy::OnFailure {
            max_retries: Some(5),
        });
        assert_eq!(policy.name, Some(RestartPolicyNameEnum::ON_FAILURE));
        assert_eq!(policy.maximum_retry_count, Some(5));

        let policy = engine_restart_policy(RestartPolicy::No);
        assert_eq!(policy.name, Some(RestartPolicyNameEnum::NO));
        assert_eq!(policy.maximum_retry_count, None);
    }

    #[test]
    fn named_volumes_mount_as_volumes() {
        let volume = VolumeMount {
            source: MountSource::Named("pgdata".to_string()),
            target: "/var/lib/postgresql/data".to_string(),
        };
        let mount = engine_mount(&volume.source, &volume.target);
        assert_eq!(mount.typ, Some(MountTypeEnum::VOLUME));
        assert_eq!(mount.source.as_deref(), Some("pgdata"));
    }

    #[test]
    fn timeouts_convert_to_whole_seconds() {
        assert_eq!(timeout_secs(None), None);
        assert_eq!(timeout_secs(Some(Duration::from_millis(10_500))), Some(10));
    }
}
