// ABOUTME: Handle to a detached deployment task.
// ABOUTME: Exposes status changes and the final record without letting callers cancel it.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::model::{Deployment, DeploymentStatus};
use crate::types::DeploymentId;

use super::error::DeployError;

/// An in-flight deployment.
///
/// Dropping the handle detaches from the task; the deployment keeps running.
#[derive(Debug)]
pub struct DeploymentTask {
    id: DeploymentId,
    status: watch::Receiver<DeploymentStatus>,
    join: JoinHandle<Result<Deployment, DeployError>>,
}

impl DeploymentTask {
    pub(crate) fn new(
        id: DeploymentId,
        status: watch::Receiver<DeploymentStatus>,
        join: JoinHandle<Result<Deployment, DeployError>>,
    ) -> Self {
        DeploymentTask { id, status, join }
    }

    pub fn id(&self) -> DeploymentId {
        self.id
    }

    /// Most recently published status.
    pub fn status(&self) -> DeploymentStatus {
        *self.status.borrow()
    }

    /// A receiver that observes every later status change.
    pub fn subscribe(&self) -> watch::Receiver<DeploymentStatus> {
        self.status.clone()
    }

    /// Wait for the task to finish and return the final record.
    ///
    /// A failed deployment is still `Ok`: its outcome lives in the record's
    /// status and logs. `Err` means the task could not record an outcome.
    pub async fn wait(self) -> Result<Deployment, DeployError> {
        self.join
            .await
            .map_err(|e| DeployError::TaskAborted(e.to_string()))?
    }
}
