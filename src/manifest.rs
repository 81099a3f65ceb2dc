// ABOUTME: Declarative service manifest applied to the bundled store.
// ABOUTME: Creates or updates a project, its services, domains, ports, and volumes.

use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::EnvValue;
use crate::crypto::SecretCodec;
use crate::deploy::DeployError;
use crate::error::{Error, Result};
use crate::model::{
    Domain, Membership, PortMapping, Project, Protocol, RestartPolicy, Service, TeamRole, Volume,
};
use crate::store::{AccessGuard, MemoryStore};
use crate::types::{Hostname, ImageRef, ProjectId, ServiceId, Slug, TeamId, UserId};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub project: String,
    /// Source-control token stored encrypted on the project.
    #[serde(default)]
    pub git_token: Option<EnvValue>,
    #[serde(default)]
    pub services: Vec<ServiceManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceManifest {
    pub name: String,
    pub slug: Slug,
    pub image: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default)]
    pub cpu_limit: Option<f64>,
    /// Megabytes.
    #[serde(default)]
    pub memory_limit: Option<u32>,
    #[serde(default)]
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub health_check_path: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,
    #[serde(default)]
    pub domains: Vec<DomainManifest>,
    #[serde(default)]
    pub ports: Vec<PortManifest>,
    #[serde(default)]
    pub volumes: Vec<VolumeManifest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainManifest {
    pub hostname: Hostname,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub ssl_auto: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortManifest {
    pub container_port: u16,
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VolumeManifest {
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub host_path: Option<String>,
}

fn default_replicas() -> u32 {
    1
}

/// Outcome of applying one service entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedService {
    pub slug: Slug,
    pub id: ServiceId,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyReport {
    pub project: ProjectId,
    pub services: Vec<AppliedService>,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::InvalidManifest("project name cannot be empty".to_string()));
        }
        for svc in &self.services {
            ImageRef::parse(&svc.image).map_err(|e| {
                Error::InvalidManifest(format!("service {}: image {:?}: {e}", svc.slug, svc.image))
            })?;
            if svc
                .cpu_limit
                .is_some_and(|cpus| !cpus.is_finite() || cpus <= 0.0)
            {
                return Err(Error::InvalidManifest(format!(
                    "service {}: cpu_limit must be a positive finite number",
                    svc.slug
                )));
            }
        }
        Ok(())
    }

    /// Write the manifest into `store`.
    ///
    /// A new project is owned by `actor`. Applying to an existing project
    /// requires `actor` to be a member of its team. Runtime state of existing
    /// services (status, handle) is kept.
    pub async fn apply(
        &self,
        store: &MemoryStore,
        codec: &SecretCodec,
        actor: UserId,
    ) -> Result<ApplyReport> {
        let git_token = match &self.git_token {
            Some(token) => Some(codec.encrypt_string(&token.resolve()?)?),
            None => None,
        };

        let project = match store.find_project(&self.project) {
            Some(existing) => {
                if store.role(actor, existing.id).await?.is_none() {
                    return Err(DeployError::NotTeamMember {
                        actor,
                        project: existing.id,
                    }
                    .into());
                }
                existing
            }
            None => {
                let project = Project {
                    id: ProjectId::generate(),
                    team_id: TeamId::generate(),
                    name: self.project.clone(),
                    git_token_encrypted: None,
                };
                store.set_membership(Membership {
                    team_id: project.team_id,
                    user_id: actor,
                    role: TeamRole::Owner,
                });
                tracing::info!(project = %project.name, id = %project.id, "project created");
                project
            }
        };
        let project = Project {
            git_token_encrypted: git_token.or(project.git_token_encrypted),
            ..project
        };
        let project_id = project.id;
        store.insert_project(project);

        let mut services = Vec::with_capacity(self.services.len());
        for entry in &self.services {
            services.push(entry.apply(store, codec, project_id)?);
        }

        Ok(ApplyReport {
            project: project_id,
            services,
        })
    }
}

impl ServiceManifest {
    fn apply(
        &self,
        store: &MemoryStore,
        codec: &SecretCodec,
        project: ProjectId,
    ) -> Result<AppliedService> {
        let existing = store.find_service(project, &self.slug);
        let created = existing.is_none();
        let mut service =
            existing.unwrap_or_else(|| Service::new(project, &self.name, self.slug.clone()));

        let env = self
            .env
            .iter()
            .map(|(key, value)| Ok((key.clone(), value.resolve()?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        service.name = self.name.clone();
        service.image = Some(self.image.clone());
        service.replicas = self.replicas;
        service.cpu_limit = self.cpu_limit;
        service.memory_limit = self.memory_limit;
        service.restart_policy = self.restart_policy;
        service.health_check_path = self.health_check_path.clone();
        service.env_encrypted = if env.is_empty() {
            None
        } else {
            Some(codec.encrypt_env(&env)?)
        };
        service.updated_at = Utc::now();

        let id = service.id;
        store.upsert_service(service)?;

        let domains = self
            .domains
            .iter()
            .map(|d| {
                let domain = Domain::new(id, d.hostname.as_str());
                if d.ssl { domain.with_ssl(d.ssl_auto) } else { domain }
            })
            .collect();
        store.replace_domains(id, domains)?;

        store.replace_port_mappings(
            id,
            self.ports
                .iter()
                .map(|p| PortMapping {
                    service_id: id,
                    container_port: p.container_port,
                    host_port: p.host_port,
                    protocol: p.protocol,
                })
                .collect(),
        );
        store.replace_volumes(
            id,
            self.volumes
                .iter()
                .map(|v| Volume {
                    service_id: id,
                    name: v.name.clone(),
                    mount_path: v.mount_path.clone(),
                    host_path: v.host_path.clone(),
                })
                .collect(),
        );

        tracing::info!(slug = %self.slug, service_id = %id, created, "service applied");
        Ok(AppliedService {
            slug: self.slug.clone(),
            id,
            created,
        })
    }
}
