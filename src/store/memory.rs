// ABOUTME: In-memory store and access guard with JSON snapshot persistence.
// ABOUTME: Every write happens under one lock, so terminal writes are atomic.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::{AccessGuard, Entity, Store, StoreError};
use crate::model::{
    Deployment, Domain, Membership, PortMapping, Project, RuntimeHandle, Service, ServiceStatus,
    TeamRole, Volume,
};
use crate::types::{DeploymentId, ProjectId, ServiceId, Slug, UserId};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct State {
    projects: BTreeMap<ProjectId, Project>,
    memberships: Vec<Membership>,
    services: BTreeMap<ServiceId, Service>,
    deployments: BTreeMap<DeploymentId, Deployment>,
    domains: Vec<Domain>,
    port_mappings: Vec<PortMapping>,
    volumes: Vec<Volume>,
}

impl State {
    fn service_mut(&mut self, id: ServiceId) -> Result<&mut Service, StoreError> {
        self.services
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(Entity::Service, id))
    }

    fn check_deployment_update(&self, next: &Deployment) -> Result<(), StoreError> {
        let stored = self
            .deployments
            .get(&next.id)
            .ok_or_else(|| StoreError::not_found(Entity::Deployment, next.id))?;
        stored.check_update(next)?;
        Ok(())
    }
}

/// A [`Store`] and [`AccessGuard`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a snapshot, starting empty when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let state = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(MemoryStore {
            state: RwLock::new(state),
        })
    }

    /// Write a snapshot, replacing the file only once the new content is complete.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&*self.state.read())?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn insert_project(&self, project: Project) {
        self.state.write().projects.insert(project.id, project);
    }

    pub fn find_project(&self, name: &str) -> Option<Project> {
        self.state
            .read()
            .projects
            .values()
            .find(|p| p.name == name)
            .cloned()
    }

    /// Add or replace a membership for the same team and user.
    pub fn set_membership(&self, membership: Membership) {
        let mut state = self.state.write();
        state
            .memberships
            .retain(|m| !(m.team_id == membership.team_id && m.user_id == membership.user_id));
        state.memberships.push(membership);
    }

    /// Insert or replace a service record.
    pub fn upsert_service(&self, service: Service) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if !state.projects.contains_key(&service.project_id) {
            return Err(StoreError::not_found(Entity::Project, service.project_id));
        }
        let clash = state.services.values().any(|s| {
            s.id != service.id && s.project_id == service.project_id && s.slug == service.slug
        });
        if clash {
            return Err(StoreError::Conflict {
                entity: Entity::Service,
                id: service.slug.to_string(),
            });
        }
        state.services.insert(service.id, service);
        Ok(())
    }

    pub fn find_service(&self, project: ProjectId, slug: &Slug) -> Option<Service> {
        self.state
            .read()
            .services
            .values()
            .find(|s| s.project_id == project && &s.slug == slug)
            .cloned()
    }

    /// Replace the domains of a service. A hostname may belong to one service only.
    pub fn replace_domains(&self, service: ServiceId, domains: Vec<Domain>) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Some(taken) = domains.iter().find(|d| {
            state
                .domains
                .iter()
                .any(|existing| existing.service_id != service && existing.hostname == d.hostname)
        }) {
            return Err(StoreError::Conflict {
                entity: Entity::Domain,
                id: taken.hostname.clone(),
            });
        }
        state.domains.retain(|d| d.service_id != service);
        state.domains.extend(domains);
        Ok(())
    }

    pub fn replace_port_mappings(&self, service: ServiceId, ports: Vec<PortMapping>) {
        let mut state = self.state.write();
        state.port_mappings.retain(|p| p.service_id != service);
        state.port_mappings.extend(ports);
    }

    pub fn replace_volumes(&self, service: ServiceId, volumes: Vec<Volume>) {
        let mut state = self.state.write();
        state.volumes.retain(|v| v.service_id != service);
        state.volumes.extend(volumes);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_service(&self, id: ServiceId) -> Result<Service, StoreError> {
        self.state
            .read()
            .services
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Service, id))
    }

    async fn list_services(&self) -> Result<Vec<Service>, StoreError> {
        Ok(self.state.read().services.values().cloned().collect())
    }

    async fn update_service_status(
        &self,
        id: ServiceId,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let service = state.service_mut(id)?;
        service.status = status;
        service.updated_at = Utc::now();
        Ok(())
    }

    async fn update_service_handle(
        &self,
        id: ServiceId,
        handle: Option<RuntimeHandle>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let service = state.service_mut(id)?;
        service.runtime_handle = handle;
        service.updated_at = Utc::now();
        Ok(())
    }

    async fn update_service_replicas(
        &self,
        id: ServiceId,
        replicas: u32,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let service = state.service_mut(id)?;
        service.replicas = replicas;
        service.updated_at = Utc::now();
        Ok(())
    }

    async fn create_deployment(&self, deployment: &Deployment) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.deployments.contains_key(&deployment.id) {
            return Err(StoreError::Conflict {
                entity: Entity::Deployment,
                id: deployment.id.to_string(),
            });
        }
        if !state.services.contains_key(&deployment.service_id) {
            return Err(StoreError::not_found(Entity::Service, deployment.service_id));
        }
        state.deployments.insert(deployment.id, deployment.clone());
        Ok(())
    }

    async fn update_deployment(&self, deployment: &Deployment) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.check_deployment_update(deployment)?;
        state.deployments.insert(deployment.id, deployment.clone());
        Ok(())
    }

    async fn finish_deployment(
        &self,
        deployment: &Deployment,
        service_status: ServiceStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.check_deployment_update(deployment)?;
        let service = state.service_mut(deployment.service_id)?;
        service.status = service_status;
        service.updated_at = Utc::now();
        state.deployments.insert(deployment.id, deployment.clone());
        Ok(())
    }

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, StoreError> {
        self.state
            .read()
            .deployments
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Deployment, id))
    }

    async fn list_deployments(
        &self,
        service: ServiceId,
        limit: usize,
    ) -> Result<Vec<Deployment>, StoreError> {
        let state = self.state.read();
        let mut deployments: Vec<Deployment> = state
            .deployments
            .values()
            .filter(|d| d.service_id == service)
            .cloned()
            .collect();
        deployments.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        deployments.truncate(limit);
        Ok(deployments)
    }

    async fn list_unfinished_deployments(&self) -> Result<Vec<Deployment>, StoreError> {
        Ok(self
            .state
            .read()
            .deployments
            .values()
            .filter(|d| !d.is_finished())
            .cloned()
            .collect())
    }

    async fn list_domains(&self, service: ServiceId) -> Result<Vec<Domain>, StoreError> {
        Ok(self
            .state
            .read()
            .domains
            .iter()
            .filter(|d| d.service_id == service)
            .cloned()
            .collect())
    }

    async fn list_port_mappings(
        &self,
        service: ServiceId,
    ) -> Result<Vec<PortMapping>, StoreError> {
        Ok(self
            .state
            .read()
            .port_mappings
            .iter()
            .filter(|p| p.service_id == service)
            .cloned()
            .collect())
    }

    async fn list_volumes(&self, service: ServiceId) -> Result<Vec<Volume>, StoreError> {
        Ok(self
            .state
            .read()
            .volumes
            .iter()
            .filter(|v| v.service_id == service)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AccessGuard for MemoryStore {
    async fn role(&self, actor: UserId, project: ProjectId) -> Result<Option<TeamRole>, StoreError> {
        let state = self.state.read();
        let project = state
            .projects
            .get(&project)
            .ok_or_else(|| StoreError::not_found(Entity::Project, project))?;
        Ok(state
            .memberships
            .iter()
            .find(|m| m.team_id == project.team_id && m.user_id == actor)
            .map(|m| m.role))
    }
}
