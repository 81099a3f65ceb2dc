// ABOUTME: Service record: desired deployment configuration plus observed status.
// ABOUTME: Holds at most one live runtime handle, replaced on every deploy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::RestartPolicy;
use crate::types::{ClusterServiceId, ContainerId, ProjectId, ServiceId, Slug};

/// How a service's workload is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployType {
    Image,
    Dockerfile,
    Compose,
}

impl DeployType {
    /// Only prebuilt images can be deployed today.
    pub fn is_executable(self) -> bool {
        matches!(self, DeployType::Image)
    }
}

impl fmt::Display for DeployType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployType::Image => write!(f, "image"),
            DeployType::Dockerfile => write!(f, "dockerfile"),
            DeployType::Compose => write!(f, "compose"),
        }
    }
}

/// Last known runtime status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Running,
    Deploying,
    Failed,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Stopped => write!(f, "stopped"),
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Deploying => write!(f, "deploying"),
            ServiceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Reference to the live object inside the container engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum RuntimeHandle {
    Container(ContainerId),
    ClusterService(ClusterServiceId),
}

impl fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeHandle::Container(id) => write!(f, "container:{}", id),
            RuntimeHandle::ClusterService(id) => write!(f, "service:{}", id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub project_id: ProjectId,
    pub name: String,
    pub slug: Slug,
    pub deploy_type: DeployType,
    #[serde(default)]
    pub image: Option<String>,
    /// Encrypted JSON object of environment variables (see `SecretCodec::encrypt_env`).
    #[serde(default)]
    pub env_encrypted: Option<String>,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    /// Fractional CPU cores.
    #[serde(default)]
    pub cpu_limit: Option<f64>,
    /// Megabytes.
    #[serde(default)]
    pub memory_limit: Option<u32>,
    #[serde(default)]
    pub health_check_path: Option<String>,
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval: u32,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub runtime_handle: Option<RuntimeHandle>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_replicas() -> u32 {
    1
}

fn default_health_check_interval() -> u32 {
    30
}

impl Service {
    /// A new image-based service with the defaults applied at creation time.
    pub fn new(project_id: ProjectId, name: impl Into<String>, slug: Slug) -> Self {
        let now = Utc::now();
        Service {
            id: ServiceId::generate(),
            project_id,
            name: name.into(),
            slug,
            deploy_type: DeployType::Image,
            image: None,
            env_encrypted: None,
            replicas: default_replicas(),
            cpu_limit: None,
            memory_limit: None,
            health_check_path: None,
            health_check_interval: default_health_check_interval(),
            restart_policy: RestartPolicy::default(),
            status: ServiceStatus::Stopped,
            runtime_handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The configured image, ignoring blank values.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Name of the container or cluster service created for this service.
    pub fn workload_name(&self) -> String {
        format!("keel-{}", self.slug)
    }

    /// Memory limit converted to bytes.
    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit.map(|mb| u64::from(mb) * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> Service {
        Service::new(ProjectId::generate(), "Web", Slug::new("web").unwrap())
    }

    #[test]
    fn blank_image_counts_as_missing() {
        let mut svc = service();
        svc.image = Some("   ".to_string());
        assert_eq!(svc.image(), None);
        svc.image = Some("nginx:latest".to_string());
        assert_eq!(svc.image(), Some("nginx:latest"));
    }

    #[test]
    fn memory_converts_megabytes_to_bytes() {
        let mut svc = service();
        svc.memory_limit = Some(512);
        assert_eq!(svc.memory_limit_bytes(), Some(512 * 1_048_576));
    }

    #[test]
    fn runtime_handle_is_tagged_in_json() {
        let handle = RuntimeHandle::Container(ContainerId::new("abc"));
        assert_eq!(
            serde_json::to_string(&handle).unwrap(),
            r#"{"kind":"container","id":"abc"}"#
        );
    }

    #[test]
    fn only_image_deploys_are_executable() {
        assert!(DeployType::Image.is_executable());
        assert!(!DeployType::Dockerfile.is_executable());
        assert!(!DeployType::Compose.is_executable());
    }
}
