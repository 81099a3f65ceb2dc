// ABOUTME: Store fixtures shared by orchestrator tests.
// ABOUTME: A project with one member, services with images, and an orchestrator over a fake runtime.

use keel::config::ProxyConfig;
use keel::crypto::SecretCodec;
use keel::deploy::{Orchestrator, OrchestratorSettings};
use keel::model::{Domain, Membership, Project, Service, TeamRole};
use keel::store::MemoryStore;
use keel::types::{ProjectId, Slug, TeamId, UserId};
use secrecy::SecretString;
use std::sync::Arc;

use super::fake_runtime::FakeRuntime;

pub const KEY: &str = "test-encryption-key";

pub type TestOrchestrator = Orchestrator<FakeRuntime, MemoryStore, MemoryStore>;

pub struct World {
    pub store: Arc<MemoryStore>,
    pub member: UserId,
    pub project: ProjectId,
}

impl World {
    /// A store with one project whose team has one member.
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let member = UserId::generate();
        let project = Project {
            id: ProjectId::generate(),
            team_id: TeamId::generate(),
            name: "shop".to_string(),
            git_token_encrypted: None,
        };
        store.set_membership(Membership {
            team_id: project.team_id,
            user_id: member,
            role: TeamRole::Member,
        });
        let project_id = project.id;
        store.insert_project(project);

        World {
            store: Arc::new(store),
            member,
            project: project_id,
        }
    }

    /// Add an image service. `None` leaves the image unset.
    pub fn service(&self, slug: &str, image: Option<&str>) -> Service {
        let mut service = Service::new(self.project, slug, Slug::new(slug).unwrap());
        service.image = image.map(str::to_string);
        self.store.upsert_service(service.clone()).unwrap();
        service
    }

    pub fn update(&self, service: &Service) {
        self.store.upsert_service(service.clone()).unwrap();
    }

    pub fn bind(&self, service: &Service, hostname: &str, ssl_auto: Option<bool>) {
        let mut domain = Domain::new(service.id, hostname);
        if let Some(auto) = ssl_auto {
            domain = domain.with_ssl(auto);
        }
        self.store.replace_domains(service.id, vec![domain]).unwrap();
    }

    pub fn orchestrator(&self, runtime: FakeRuntime) -> TestOrchestrator {
        self.orchestrator_with(runtime, OrchestratorSettings::default())
    }

    pub fn orchestrator_with(
        &self,
        runtime: FakeRuntime,
        settings: OrchestratorSettings,
    ) -> TestOrchestrator {
        Orchestrator::new(
            runtime,
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            codec(),
            settings,
        )
    }
}

pub fn codec() -> SecretCodec {
    SecretCodec::new(&SecretString::from(KEY.to_string())).unwrap()
}

pub fn settings(proxy: ProxyConfig, max_concurrent: usize) -> OrchestratorSettings {
    OrchestratorSettings {
        proxy,
        max_concurrent,
        stop_timeout: None,
    }
}
