// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, ClusterServiceInfo, etc.

use crate::model::{self, Protocol, RestartPolicy};
use crate::types::{ClusterServiceId, ContainerId, ImageRef};
use std::collections::BTreeMap;
use std::fmt;

/// Configuration for creating a container, or the task template of a
/// cluster service.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Name for the container or cluster service.
    pub name: String,
    /// Image to run.
    pub image: ImageRef,
    /// Environment variables.
    pub env: BTreeMap<String, String>,
    /// Labels to apply.
    pub labels: BTreeMap<String, String>,
    /// Published ports.
    pub ports: Vec<PortMapping>,
    /// Volume mounts.
    pub volumes: Vec<VolumeMount>,
    pub restart_policy: RestartPolicy,
    pub resources: ResourceLimits,
    /// Network to attach to.
    pub network: Option<String>,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    /// Host port; `None` publishes nothing on the host.
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Key used by the engine API, e.g. `8080/tcp`.
    pub fn port_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol.as_str())
    }
}

impl From<&model::PortMapping> for PortMapping {
    fn from(p: &model::PortMapping) -> Self {
        PortMapping {
            host_port: p.host_port,
            container_port: p.container_port,
            protocol: p.protocol,
        }
    }
}

/// Volume mount configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: MountSource,
    /// Target path in container.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountSource {
    /// A path on the host, bind-mounted.
    Bind(String),
    /// A named volume managed by the engine.
    Named(String),
}

impl From<&model::Volume> for VolumeMount {
    fn from(v: &model::Volume) -> Self {
        let source = match v.host_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => MountSource::Bind(path.to_string()),
            None => MountSource::Named(v.name.clone()),
        };
        VolumeMount {
            source,
            target: v.mount_path.clone(),
        }
    }
}

/// Resource limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceLimits {
    /// Memory limit in bytes.
    pub memory: Option<u64>,
    /// CPU quota (1.0 = 1 CPU).
    pub cpus: Option<f64>,
}

impl ResourceLimits {
    /// CPU quota in billionths of a core, as the engine expects it.
    pub fn nano_cpus(&self) -> Option<i64> {
        self.cpus.map(|cpus| (cpus * 1_000_000_000.0) as i64)
    }

    pub fn memory_bytes(&self) -> Option<i64> {
        self.memory.map(|bytes| i64::try_from(bytes).unwrap_or(i64::MAX))
    }
}

/// Information about a container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub state: ContainerState,
    /// Exit code of the last run, if it has exited.
    pub exit_code: Option<i64>,
}

impl ContainerInfo {
    /// Human-readable status, e.g. `running` or `exited (1)`.
    pub fn status(&self) -> String {
        match (self.state, self.exit_code) {
            (ContainerState::Exited, Some(code)) => format!("exited ({code})"),
            (state, _) => state.to_string(),
        }
    }
}

/// Container state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Information about a replicated cluster service.
#[derive(Debug, Clone)]
pub struct ClusterServiceInfo {
    pub id: ClusterServiceId,
    pub name: String,
    /// Desired replica count from the service spec.
    pub replicas: u64,
    /// Spec version used for optimistic concurrency on updates.
    pub version: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceId;

    #[test]
    fn volume_with_host_path_is_a_bind_mount() {
        let volume = model::Volume {
            service_id: ServiceId::generate(),
            name: "data".to_string(),
            mount_path: "/var/lib/data".to_string(),
            host_path: Some("/srv/data".to_string()),
        };
        let mount = VolumeMount::from(&volume);
        assert_eq!(mount.source, MountSource::Bind("/srv/data".to_string()));
        assert_eq!(mount.target, "/var/lib/data");

        let named = model::Volume {
            host_path: None,
            ..volume
        };
        assert_eq!(
            VolumeMount::from(&named).source,
            MountSource::Named("data".to_string())
        );
    }

    #[test]
    fn cpu_quota_converts_to_nano_cpus() {
        let limits = ResourceLimits {
            memory: Some(256 * 1024 * 1024),
            cpus: Some(0.5),
        };
        assert_eq!(limits.nano_cpus(), Some(500_000_000));
        assert_eq!(limits.memory_bytes(), Some(268_435_456));
    }

    #[test]
    fn exited_status_includes_exit_code() {
        let info = ContainerInfo {
            id: ContainerId::new("abc"),
            state: ContainerState::Exited,
            exit_code: Some(137),
        };
        assert_eq!(info.status(), "exited (137)");
    }
}
