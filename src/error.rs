// ABOUTME: Application-wide error type for configuration and the CLI.
// ABOUTME: Library modules keep their own error enums; this one wraps them.

use std::path::PathBuf;
use thiserror::Error;

use crate::crypto::SecretError;
use crate::deploy::DeployError;
use crate::runtime::RuntimeError;
use crate::store::StoreError;
use crate::types::DeploymentId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("no such service: {0}")]
    UnknownService(String),

    #[error("no actor given: pass --actor or set `actor` in the config")]
    NoActor,

    #[error("deployment {id} failed: {reason}")]
    DeploymentFailed { id: DeploymentId, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;
