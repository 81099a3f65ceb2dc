// ABOUTME: Persistence and access-guard ports consumed by the orchestrator.
// ABOUTME: The storage format belongs to the implementation; MemoryStore is the bundled one.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use std::fmt;

use crate::model::{
    Deployment, Domain, PortMapping, RuntimeHandle, Service, ServiceStatus, TeamRole,
    TransitionError, Volume,
};
use crate::types::{DeploymentId, ProjectId, ServiceId, UserId};

/// Kind of record a store error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Service,
    Project,
    Deployment,
    Domain,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Service => write!(f, "service"),
            Entity::Project => write!(f, "project"),
            Entity::Deployment => write!(f, "deployment"),
            Entity::Domain => write!(f, "domain"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("{entity} already exists: {id}")]
    Conflict { entity: Entity, id: String },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Records the orchestrator reads and writes.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_service(&self, id: ServiceId) -> Result<Service, StoreError>;

    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;

    async fn update_service_status(
        &self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<(), StoreError>;

    /// Replace the service's runtime handle. `None` clears it.
    async fn update_service_handle(
        &self,
        id: ServiceId,
        handle: Option<RuntimeHandle>,
    ) -> Result<(), StoreError>;

    async fn update_service_replicas(&self, id: ServiceId, replicas: u32)
    -> Result<(), StoreError>;

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), StoreError>;

    /// Overwrite a deployment. Implementations must reject regressions and
    /// edits to finished records.
    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), StoreError>;

    /// Write a finished deployment and its service's status as one step.
    async fn finish_deployment(
        &self,
        deployment: &Deployment,
        service_status: ServiceStatus,
    ) -> Result<(), StoreError>;

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, StoreError>;

    /// Deployments of one service, newest first.
    async fn list_deployments(
        &self,
        service: ServiceId,
        limit: usize,
    ) -> Result<Vec<Deployment>, StoreError>;

    /// Deployments without a finish time, across all services.
    async fn list_unfinished_deployments(&self) -> Result<Vec<Deployment>, StoreError>;

    async fn list_domains(&self, service: ServiceId) -> Result<Vec<Domain>, StoreError>;

    async fn list_port_mappings(&self, service: ServiceId)
    -> Result<Vec<PortMapping>, StoreError>;

    async fn list_volumes(&self, service: ServiceId) -> Result<Vec<Volume>, StoreError>;
}

/// Team-membership check for the team owning a project.
#[async_trait]
pub trait AccessGuard: Send + Sync + 'static {
    /// The actor's role in the project's team, or `None` if they are not a member.
    ///
    /// Fails with [`StoreError::NotFound`] when the project does not exist.
    async fn role(&self, actor: UserId, project: ProjectId) -> Result<Option<TeamRole>, StoreError>;
}
