// ABOUTME: Public deployment surface: deploy, start, stop, restart, logs, destroy, scale, status.
// ABOUTME: Checks access and preconditions up front, then runs deployments as detached tasks.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tracing::{Instrument, debug, error, info, warn};

use crate::config::{Config, ProxyConfig};
use crate::crypto::SecretCodec;
use crate::labels::build_labels;
use crate::model::{Deployment, DeploymentStatus, RuntimeHandle, Service, ServiceStatus};
use crate::runtime::{
    ContainerConfig, LogOptions, ResourceLimits, RuntimeError, RuntimeMode, WorkloadInfo,
    WorkloadRuntime, WorkloadSpec,
};
use crate::store::{AccessGuard, Store};
use crate::types::{ImageRef, ServiceId, UserId};

use super::attempt::Attempt;
use super::error::DeployError;
use super::logs::{CapturedLogs, DEFAULT_TAIL, MAX_LOG_BYTES, read_capped};
use super::state::Pending;
use super::task::DeploymentTask;

/// Tunables taken from the configuration file.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub proxy: ProxyConfig,
    /// Deployment tasks allowed to do runtime work at the same time.
    pub max_concurrent: usize,
    /// Grace period for stopping workloads; `None` uses the engine default.
    pub stop_timeout: Option<Duration>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            proxy: ProxyConfig::default(),
            max_concurrent: 4,
            stop_timeout: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        OrchestratorSettings {
            proxy: config.proxy.clone(),
            max_concurrent: config.deploy.max_concurrent,
            stop_timeout: config.runtime.stop_timeout,
        }
    }
}

/// A service's persisted state next to what the engine reports.
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub service: Service,
    /// `None` when the service has no handle or the workload is gone.
    pub workload: Option<WorkloadInfo>,
    pub latest: Option<Deployment>,
}

/// Services with a deployment in flight in this process.
pub(super) type Claims = Arc<Mutex<HashSet<ServiceId>>>;

/// Exclusive right to deploy one service, released on drop.
#[derive(Debug)]
struct ServiceClaim {
    claims: Claims,
    service: ServiceId,
}

impl ServiceClaim {
    fn acquire(claims: &Claims, service: ServiceId) -> Option<Self> {
        if !claims.lock().insert(service) {
            return None;
        }
        Some(ServiceClaim {
            claims: Arc::clone(claims),
            service,
        })
    }
}

impl Drop for ServiceClaim {
    fn drop(&mut self) {
        self.claims.lock().remove(&self.service);
    }
}

pub(super) struct Inner<R, S, G> {
    pub(super) runtime: R,
    pub(super) store: Arc<S>,
    guard: Arc<G>,
    codec: SecretCodec,
    settings: OrchestratorSettings,
    permits: Semaphore,
    pub(super) claims: Claims,
}

/// Entry point for every operation on a service's workload.
///
/// Cloning is cheap; clones share the runtime, the store, the concurrency
/// permits, and the set of in-flight deployments.
pub struct Orchestrator<R, S, G> {
    pub(super) inner: Arc<Inner<R, S, G>>,
}

impl<R, S, G> Clone for Orchestrator<R, S, G> {
    fn clone(&self) -> Self {
        Orchestrator {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn require_handle(service: &Service) -> Result<&RuntimeHandle, DeployError> {
    service
        .runtime_handle
        .as_ref()
        .ok_or(DeployError::ServiceNotDeployed(service.id))
}

impl<R, S, G> Orchestrator<R, S, G>
where
    R: WorkloadRuntime,
    S: Store,
    G: AccessGuard,
{
    pub fn new(
        runtime: R,
        store: Arc<S>,
        guard: Arc<G>,
        codec: SecretCodec,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = Semaphore::new(settings.max_concurrent.max(1));
        Orchestrator {
            inner: Arc::new(Inner {
                runtime,
                store,
                guard,
                codec,
                settings,
                permits,
                claims: Claims::default(),
            }),
        }
    }

    pub fn runtime(&self) -> &R {
        &self.inner.runtime
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.inner.settings
    }

    /// Accept a deployment and run it in the background.
    ///
    /// Returns the pending record as soon as it is stored. Failures after that
    /// point are recorded on the deployment and the service, not returned here.
    pub async fn deploy(
        &self,
        actor: UserId,
        service_id: ServiceId,
    ) -> Result<(Deployment, DeploymentTask), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;

        let claim = ServiceClaim::acquire(&self.inner.claims, service_id)
            .ok_or(DeployError::AlreadyDeploying(service_id))?;
        if service.status == ServiceStatus::Deploying {
            return Err(DeployError::AlreadyDeploying(service_id));
        }
        if !service.deploy_type.is_executable() {
            return Err(DeployError::UnsupportedDeployType(service.deploy_type));
        }
        let image = service
            .image()
            .ok_or(DeployError::NoImageSpecified(service_id))?;
        let image = ImageRef::parse(image).map_err(|source| DeployError::InvalidImage {
            image: image.to_string(),
            source,
        })?;

        let attempt = Attempt::new(service_id, Some(actor));
        self.inner.store.create_deployment(attempt.record()).await?;
        let record = attempt.record().clone();
        info!(service_id = %service_id, deployment_id = %record.id, %image, "deployment accepted");

        let (status_tx, status_rx) = watch::channel(DeploymentStatus::Pending);
        let span = tracing::info_span!(
            "deployment",
            service_id = %service_id,
            deployment_id = %record.id
        );
        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(
            async move {
                let _claim = claim;
                inner.run(attempt, image, status_tx).await
            }
            .instrument(span),
        );

        let task = DeploymentTask::new(record.id, status_rx, join);
        Ok((record, task))
    }

    pub async fn start(&self, actor: UserId, service_id: ServiceId) -> Result<(), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let handle = require_handle(&service)?;

        self.inner.runtime.start(handle, service.replicas).await?;
        self.inner
            .store
            .update_service_status(service_id, ServiceStatus::Running)
            .await?;
        info!(service_id = %service_id, %handle, "service started");
        Ok(())
    }

    pub async fn stop(&self, actor: UserId, service_id: ServiceId) -> Result<(), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let handle = require_handle(&service)?;

        self.inner
            .runtime
            .stop(handle, self.inner.settings.stop_timeout)
            .await?;
        self.inner
            .store
            .update_service_status(service_id, ServiceStatus::Stopped)
            .await?;
        info!(service_id = %service_id, %handle, "service stopped");
        Ok(())
    }

    /// Restart the workload. The persisted service status is left as it was.
    pub async fn restart(&self, actor: UserId, service_id: ServiceId) -> Result<(), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let handle = require_handle(&service)?;

        self.inner
            .runtime
            .restart(handle, self.inner.settings.stop_timeout)
            .await?;
        info!(service_id = %service_id, %handle, status = %service.status, "service restarted");
        Ok(())
    }

    /// Fetch recent log output, bounded to [`MAX_LOG_BYTES`].
    ///
    /// `tail` defaults to [`DEFAULT_TAIL`] lines.
    pub async fn logs(
        &self,
        actor: UserId,
        service_id: ServiceId,
        tail: Option<&str>,
        since: Option<&str>,
    ) -> Result<CapturedLogs, DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let handle = require_handle(&service)?;

        let tail = tail.map(str::trim).filter(|t| !t.is_empty());
        let opts = LogOptions {
            tail: Some(tail.unwrap_or(DEFAULT_TAIL).to_string()),
            since: since.map(str::to_string),
            follow: false,
        };
        let stream = self.inner.runtime.logs(handle, &opts).await?;
        let logs = read_capped(stream, MAX_LOG_BYTES)
            .await
            .map_err(RuntimeError::from)?;
        if logs.truncated {
            debug!(service_id = %service_id, limit = MAX_LOG_BYTES, "log output truncated");
        }
        Ok(logs)
    }

    /// Remove the service's workload. A service without one is left as is.
    pub async fn destroy(&self, actor: UserId, service_id: ServiceId) -> Result<(), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let Some(handle) = service.runtime_handle.as_ref() else {
            debug!(service_id = %service_id, "nothing to destroy");
            return Ok(());
        };

        if let Err(e) = self
            .inner
            .runtime
            .stop(handle, self.inner.settings.stop_timeout)
            .await
        {
            warn!(service_id = %service_id, %handle, error = %e, "stop before removal failed");
        }
        self.inner.runtime.remove(handle, true).await?;

        self.inner
            .store
            .update_service_handle(service_id, None)
            .await?;
        self.inner
            .store
            .update_service_status(service_id, ServiceStatus::Stopped)
            .await?;
        info!(service_id = %service_id, %handle, "workload destroyed");
        Ok(())
    }

    /// Change the desired replica count.
    ///
    /// A running cluster service is scaled immediately; otherwise the count
    /// applies from the next deploy or start.
    pub async fn scale(
        &self,
        actor: UserId,
        service_id: ServiceId,
        replicas: u32,
    ) -> Result<(), DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;
        let mode = self.inner.runtime.mode();
        if mode == RuntimeMode::SingleHost && replicas != 1 {
            return Err(DeployError::UnsupportedInMode {
                operation: "scaling beyond one replica",
                mode,
            });
        }

        self.inner
            .store
            .update_service_replicas(service_id, replicas)
            .await?;

        if mode == RuntimeMode::Cluster
            && service.status == ServiceStatus::Running
            && let Some(handle) = service.runtime_handle.as_ref()
        {
            self.inner.runtime.scale(handle, replicas).await?;
        }
        info!(service_id = %service_id, replicas, "replica count updated");
        Ok(())
    }

    pub async fn status(
        &self,
        actor: UserId,
        service_id: ServiceId,
    ) -> Result<ServiceReport, DeployError> {
        let service = self.inner.authorize(actor, service_id).await?;

        let workload = match service.runtime_handle.as_ref() {
            None => None,
            Some(handle) => match self.inner.runtime.inspect(handle).await {
                Ok(info) => Some(info),
                Err(e) if e.is_not_found() => {
                    warn!(service_id = %service_id, %handle, "workload missing from engine");
                    None
                }
                Err(e) => return Err(e.into()),
            },
        };
        let latest = self.inner.store.list_deployments(service_id, 1).await?;

        Ok(ServiceReport {
            service,
            workload,
            latest: latest.into_iter().next(),
        })
    }

    /// Deployment history, newest first.
    pub async fn list_deployments(
        &self,
        actor: UserId,
        service_id: ServiceId,
        limit: usize,
    ) -> Result<Vec<Deployment>, DeployError> {
        self.inner.authorize(actor, service_id).await?;
        Ok(self.inner.store.list_deployments(service_id, limit).await?)
    }

    pub async fn latest_deployment(
        &self,
        actor: UserId,
        service_id: ServiceId,
    ) -> Result<Option<Deployment>, DeployError> {
        Ok(self
            .list_deployments(actor, service_id, 1)
            .await?
            .into_iter()
            .next())
    }
}

impl<R, S, G> Inner<R, S, G>
where
    R: WorkloadRuntime,
    S: Store,
    G: AccessGuard,
{
    /// Load the service and check that the actor belongs to its team.
    async fn authorize(&self, actor: UserId, service_id: ServiceId) -> Result<Service, DeployError> {
        let service = self.store.get_service(service_id).await.map_err(|e| {
            if e.is_not_found() {
                DeployError::ServiceNotFound(service_id)
            } else {
                e.into()
            }
        })?;

        match self.guard.role(actor, service.project_id).await {
            Ok(Some(role)) => {
                debug!(%actor, %role, service_id = %service_id, "access granted");
                Ok(service)
            }
            Ok(None) => Err(DeployError::NotTeamMember {
                actor,
                project: service.project_id,
            }),
            Err(e) if e.is_not_found() => Err(DeployError::ProjectNotFound(service.project_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Body of a detached deployment task.
    async fn run(
        self: Arc<Self>,
        attempt: Attempt<Pending>,
        image: ImageRef,
        status: watch::Sender<DeploymentStatus>,
    ) -> Result<Deployment, DeployError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DeployError::TaskAborted(e.to_string()))?;

        let service_id = attempt.service_id();
        let attempt = attempt.begin()?;
        self.store.update_deployment(attempt.record()).await?;
        self.store
            .update_service_status(service_id, ServiceStatus::Deploying)
            .await?;
        status.send_replace(DeploymentStatus::Deploying);
        info!("deployment started");

        let finished = match self.execute(service_id, &image).await {
            Ok(()) => attempt.succeed()?,
            Err(e) => {
                error!(error = %e, "deployment failed");
                attempt.fail(e.to_string())?
            }
        };

        self.store
            .finish_deployment(finished.record(), finished.service_status())
            .await?;
        status.send_replace(finished.record().status);
        info!(status = %finished.record().status, "deployment finished");
        Ok(finished.into_record())
    }

    /// Replace the service's workload with one running `image`.
    async fn execute(&self, service_id: ServiceId, image: &ImageRef) -> Result<(), DeployError> {
        let service = self.store.get_service(service_id).await?;

        if let Some(old) = service.runtime_handle.as_ref() {
            self.discard(old).await;
            self.store.update_service_handle(service_id, None).await?;
        }

        debug!(%image, "pulling image");
        self.runtime.pull_image(image).await?;

        let domains = self.store.list_domains(service_id).await?;
        let ports = self.store.list_port_mappings(service_id).await?;
        let volumes = self.store.list_volumes(service_id).await?;

        let env = match service
            .env_encrypted
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(document) => self.codec.decrypt_env(document)?,
            None => BTreeMap::new(),
        };

        let proxy = &self.settings.proxy;
        let labels = build_labels(&service, &domains, proxy);
        let routed = proxy.enabled && !domains.is_empty();
        if routed {
            self.runtime
                .validate_network(&proxy.network)
                .await
                .map_err(|source| DeployError::ProxyNetworkUnavailable {
                    network: proxy.network.clone(),
                    source,
                })?;
        }

        let spec = WorkloadSpec {
            config: ContainerConfig {
                name: service.workload_name(),
                image: image.clone(),
                env,
                labels,
                ports: ports.iter().map(Into::into).collect(),
                volumes: volumes.iter().map(Into::into).collect(),
                restart_policy: service.restart_policy,
                resources: ResourceLimits {
                    memory: service.memory_limit_bytes(),
                    cpus: service.cpu_limit,
                },
                network: routed.then(|| proxy.network.clone()),
            },
            replicas: service.replicas,
        };

        let handle = self.runtime.create_workload(&spec).await?;
        debug!(%handle, "workload created");
        self.store
            .update_service_handle(service_id, Some(handle.clone()))
            .await?;

        self.runtime.start(&handle, service.replicas).await?;
        Ok(())
    }

    /// Stop and remove a previous workload, ignoring failures.
    async fn discard(&self, handle: &RuntimeHandle) {
        if let Err(e) = self.runtime.stop(handle, self.settings.stop_timeout).await {
            debug!(%handle, error = %e, "old workload did not stop");
        }
        if let Err(e) = self.runtime.remove(handle, true).await {
            warn!(%handle, error = %e, "old workload could not be removed");
        }
    }
}
