// ABOUTME: Shared setup for commands that touch the store or the engine.
// ABOUTME: Loads the state snapshot, resolves the actor, and builds the orchestrator.

use keel::config::Config;
use keel::crypto::SecretCodec;
use keel::deploy::{Orchestrator, OrchestratorSettings};
use keel::error::{Error, Result};
use keel::output::Output;
use keel::runtime::Runtime;
use keel::store::MemoryStore;
use keel::types::{ServiceId, Slug, UserId};
use std::sync::Arc;

pub type CliOrchestrator = Orchestrator<Runtime, MemoryStore, MemoryStore>;

pub struct Context {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub output: Output,
    actor: Option<UserId>,
}

impl Context {
    pub fn load(config: Config, actor: Option<UserId>, output: Output) -> Result<Self> {
        let store = MemoryStore::load(&config.state)?;
        Ok(Context {
            actor: actor.or(config.actor),
            config,
            store: Arc::new(store),
            output,
        })
    }

    pub fn actor(&self) -> Result<UserId> {
        self.actor.ok_or(Error::NoActor)
    }

    pub fn codec(&self) -> Result<SecretCodec> {
        Ok(SecretCodec::new(&self.config.encryption.resolve_key()?)?)
    }

    /// Connect to the engine and wire it to the store.
    pub fn orchestrator(&self) -> Result<CliOrchestrator> {
        self.output.progress(&format!(
            "  → Connecting to {} engine at {}",
            self.config.runtime.mode,
            self.config.runtime.socket_path()
        ));
        let runtime = Runtime::connect(&self.config.runtime)?;
        Ok(Orchestrator::new(
            runtime,
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            self.codec()?,
            OrchestratorSettings::from_config(&self.config),
        ))
    }

    /// Resolve a service given by id or as `project/slug`.
    pub fn resolve_service(&self, reference: &str) -> Result<ServiceId> {
        if let Ok(id) = reference.parse::<ServiceId>() {
            return Ok(id);
        }
        let unknown = || Error::UnknownService(reference.to_string());
        let (project, slug) = reference.split_once('/').ok_or_else(unknown)?;
        let slug = Slug::new(slug).map_err(|_| unknown())?;
        let project = self.store.find_project(project).ok_or_else(unknown)?;
        self.store
            .find_service(project.id, &slug)
            .map(|s| s.id)
            .ok_or_else(unknown)
    }

    /// Persist the store snapshot.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.config.state)?;
        Ok(())
    }
}
