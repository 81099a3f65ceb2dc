// ABOUTME: Repairs records left behind by deployment tasks that never finished.
// ABOUTME: Fails orphaned deployments and releases services stuck in deploying.

use tracing::{debug, info, warn};

use crate::model::{DeploymentStatus, ServiceStatus};
use crate::runtime::WorkloadRuntime;
use crate::store::{AccessGuard, Store, StoreError};
use crate::types::{DeploymentId, ServiceId};

use super::attempt::abandon;
use super::error::DeployError;
use super::orchestrator::Orchestrator;

const INTERRUPTED: &str = "deployment interrupted before completion";

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Unfinished deployments marked failed.
    pub interrupted: Vec<DeploymentId>,
    /// Services moved out of `deploying`.
    pub repaired: Vec<ServiceId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.interrupted.is_empty() && self.repaired.is_empty()
    }
}

impl<R, S, G> Orchestrator<R, S, G>
where
    R: WorkloadRuntime,
    S: Store,
    G: AccessGuard,
{
    /// Fail deployments with no task running in this process, then give every
    /// service still marked `deploying` the status of its latest deployment.
    ///
    /// Services with a deployment in flight here are skipped.
    pub async fn reconcile(&self) -> Result<ReconcileReport, DeployError> {
        let store = &self.inner.store;
        let mut report = ReconcileReport::default();

        // List before looking at claims: a record created after the listing
        // has its service claimed for as long as its task runs.
        let unfinished = store.list_unfinished_deployments().await?;
        let claimed = self.inner.claims.lock().clone();

        for record in unfinished {
            if claimed.contains(&record.service_id) {
                continue;
            }
            let id = record.id;
            let service_id = record.service_id;
            let failed = abandon(record, INTERRUPTED)?;
            match store.update_deployment(failed.record()).await {
                Ok(()) => {
                    warn!(deployment_id = %id, service_id = %service_id, "interrupted deployment marked failed");
                    report.interrupted.push(id);
                }
                // Finished between the listing and now.
                Err(StoreError::Transition(e)) => debug!(deployment_id = %id, error = %e, "skipping"),
                Err(e) => return Err(e.into()),
            }
        }

        let services = store.list_services().await?;
        let claimed = self.inner.claims.lock().clone();

        for service in services {
            if service.status != ServiceStatus::Deploying || claimed.contains(&service.id) {
                continue;
            }
            let latest = store.list_deployments(service.id, 1).await?;
            let status = match latest.first().map(|d| d.status) {
                Some(DeploymentStatus::Success) => ServiceStatus::Running,
                _ => ServiceStatus::Failed,
            };
            store.update_service_status(service.id, status).await?;
            info!(service_id = %service.id, %status, "service status repaired");
            report.repaired.push(service.id);
        }

        Ok(report)
    }
}
