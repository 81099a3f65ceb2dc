// ABOUTME: Error types for the deployment orchestrator.
// ABOUTME: A closed set of rejection reasons plus wrapped runtime, store, and secret failures.

use crate::crypto::SecretError;
use crate::model::{DeployType, TransitionError};
use crate::runtime::{RuntimeError, RuntimeMode};
use crate::store::StoreError;
use crate::types::{ParseImageRefError, ProjectId, ServiceId, UserId};

/// Errors returned by orchestrator operations.
///
/// Everything up to and including [`DeployError::InvalidImage`] is a synchronous
/// rejection: it is returned before any deployment record is written.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("service not found: {0}")]
    ServiceNotFound(ServiceId),

    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),

    #[error("user {actor} is not a member of the team owning project {project}")]
    NotTeamMember { actor: UserId, project: ProjectId },

    #[error("service {0} is already being deployed")]
    AlreadyDeploying(ServiceId),

    #[error("service {0} has no image configured")]
    NoImageSpecified(ServiceId),

    #[error("invalid image reference {image:?}: {source}")]
    InvalidImage {
        image: String,
        #[source]
        source: ParseImageRefError,
    },

    #[error("deploy type {0} cannot be executed yet")]
    UnsupportedDeployType(DeployType),

    #[error("service {0} has not been deployed")]
    ServiceNotDeployed(ServiceId),

    #[error("{operation} is not supported in {mode} mode")]
    UnsupportedInMode {
        operation: &'static str,
        mode: RuntimeMode,
    },

    #[error("proxy network '{network}' not found - ensure the reverse proxy is running: {source}")]
    ProxyNetworkUnavailable {
        network: String,
        #[source]
        source: RuntimeError,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to decrypt service environment: {0}")]
    Secret(#[from] SecretError),

    #[error("deployment task ended abnormally: {0}")]
    TaskAborted(String),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    ServiceNotFound,
    ProjectNotFound,
    NotTeamMember,
    AlreadyDeploying,
    NoImageSpecified,
    InvalidImage,
    UnsupportedDeployType,
    ServiceNotDeployed,
    UnsupportedInMode,
    InvalidTransition,
    /// Container-engine failure, including a missing proxy network.
    Runtime,
    Store,
    Secret,
    TaskAborted,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::ServiceNotFound(_) => DeployErrorKind::ServiceNotFound,
            DeployError::ProjectNotFound(_) => DeployErrorKind::ProjectNotFound,
            DeployError::NotTeamMember { .. } => DeployErrorKind::NotTeamMember,
            DeployError::AlreadyDeploying(_) => DeployErrorKind::AlreadyDeploying,
            DeployError::NoImageSpecified(_) => DeployErrorKind::NoImageSpecified,
            DeployError::InvalidImage { .. } => DeployErrorKind::InvalidImage,
            DeployError::UnsupportedDeployType(_) => DeployErrorKind::UnsupportedDeployType,
            DeployError::ServiceNotDeployed(_) => DeployErrorKind::ServiceNotDeployed,
            DeployError::UnsupportedInMode { .. } => DeployErrorKind::UnsupportedInMode,
            DeployError::InvalidTransition(_) => DeployErrorKind::InvalidTransition,
            DeployError::ProxyNetworkUnavailable { .. } | DeployError::Runtime(_) => {
                DeployErrorKind::Runtime
            }
            DeployError::Store(_) => DeployErrorKind::Store,
            DeployError::Secret(_) => DeployErrorKind::Secret,
            DeployError::TaskAborted(_) => DeployErrorKind::TaskAborted,
        }
    }
}
