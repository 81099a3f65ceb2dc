// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Wraps every capability error unchanged so callers can classify failures.

use snafu::Snafu;

use super::traits::{ClusterError, ContainerError, ImageError, LogError, NetworkError};
use super::types::RuntimeMode;
use crate::model::RuntimeHandle;

/// Unified error for the workload runtime port.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("runtime connection failed: {message}"))]
    Connection { message: String },

    #[snafu(display("{source}"))]
    Image { source: ImageError },

    #[snafu(display("{source}"))]
    Container { source: ContainerError },

    #[snafu(display("{source}"))]
    Network { source: NetworkError },

    #[snafu(display("{source}"))]
    Logs { source: LogError },

    #[snafu(display("{source}"))]
    Cluster { source: ClusterError },

    #[snafu(display("{handle} cannot be managed by the {mode} runtime"))]
    HandleMismatch {
        handle: RuntimeHandle,
        mode: RuntimeMode,
    },

    #[snafu(display("{operation} is not supported by the {mode} runtime"))]
    Unsupported {
        operation: &'static str,
        mode: RuntimeMode,
    },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// Failed to connect to runtime socket.
    ConnectionFailed,
    /// The referenced container, service, image, or network does not exist.
    NotFound,
    /// A resource with the same name already exists.
    Conflict,
    /// The handle or operation does not belong to the configured mode.
    ModeMismatch,
    /// Any other engine failure.
    RuntimeOperation,
}

impl RuntimeError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            RuntimeError::Connection { .. } => RuntimeErrorKind::ConnectionFailed,
            RuntimeError::Image { source } => match source {
                ImageError::NotFound(_) => RuntimeErrorKind::NotFound,
                ImageError::PullFailed(_) => RuntimeErrorKind::RuntimeOperation,
            },
            RuntimeError::Container { source } => match source {
                ContainerError::NotFound(_) | ContainerError::ImageNotFound(_) => {
                    RuntimeErrorKind::NotFound
                }
                ContainerError::AlreadyExists(_) => RuntimeErrorKind::Conflict,
                _ => RuntimeErrorKind::RuntimeOperation,
            },
            RuntimeError::Network { source } => match source {
                NetworkError::NotFound(_) => RuntimeErrorKind::NotFound,
                NetworkError::Runtime(_) => RuntimeErrorKind::RuntimeOperation,
            },
            RuntimeError::Logs { source } => match source {
                LogError::NotFound(_) => RuntimeErrorKind::NotFound,
                _ => RuntimeErrorKind::RuntimeOperation,
            },
            RuntimeError::Cluster { source } => match source {
                ClusterError::NotFound(_) => RuntimeErrorKind::NotFound,
                ClusterError::AlreadyExists(_) => RuntimeErrorKind::Conflict,
                _ => RuntimeErrorKind::RuntimeOperation,
            },
            RuntimeError::HandleMismatch { .. } | RuntimeError::Unsupported { .. } => {
                RuntimeErrorKind::ModeMismatch
            }
        }
    }

    /// True when the engine reported the target missing.
    pub fn is_not_found(&self) -> bool {
        self.kind() == RuntimeErrorKind::NotFound
    }
}

impl From<ImageError> for RuntimeError {
    fn from(source: ImageError) -> Self {
        RuntimeError::Image { source }
    }
}

impl From<ContainerError> for RuntimeError {
    fn from(source: ContainerError) -> Self {
        RuntimeError::Container { source }
    }
}

impl From<NetworkError> for RuntimeError {
    fn from(source: NetworkError) -> Self {
        RuntimeError::Network { source }
    }
}

impl From<LogError> for RuntimeError {
    fn from(source: LogError) -> Self {
        RuntimeError::Logs { source }
    }
}

impl From<ClusterError> for RuntimeError {
    fn from(source: ClusterError) -> Self {
        RuntimeError::Cluster { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContainerId;

    #[test]
    fn kinds_classify_wrapped_errors() {
        let err: RuntimeError = ContainerError::NotFound("abc".into()).into();
        assert_eq!(err.kind(), RuntimeErrorKind::NotFound);
        assert!(err.is_not_found());

        let err: RuntimeError = NetworkError::NotFound("keel_traefik".into()).into();
        assert_eq!(err.to_string(), "network not found: keel_traefik");

        let err = RuntimeError::HandleMismatch {
            handle: RuntimeHandle::Container(ContainerId::new("abc")),
            mode: RuntimeMode::Cluster,
        };
        assert_eq!(err.kind(), RuntimeErrorKind::ModeMismatch);
        assert_eq!(
            err.to_string(),
            "container:abc cannot be managed by the cluster runtime"
        );
    }
}
