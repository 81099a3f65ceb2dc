// ABOUTME: Configuration types and parsing for keel.yml.
// ABOUTME: Handles YAML parsing, env var interpolation, and environment overrides.

mod env_value;
mod init;
mod proxy;

pub use env_value::EnvValue;
pub use init::init_config;
pub use proxy::ProxyConfig;

use crate::error::{Error, Result};
use crate::runtime::{RuntimeConfig, socket_from_docker_host};
use crate::types::UserId;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "keel.yml";
pub const CONFIG_FILENAME_ALT: &str = "keel.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".keel/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,

    #[serde(default)]
    pub encryption: EncryptionConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    /// Snapshot file backing the in-memory store.
    #[serde(default = "default_state_path")]
    pub state: PathBuf,

    /// Actor used by CLI commands when none is given.
    #[serde(default)]
    pub actor: Option<UserId>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EncryptionConfig {
    #[serde(default)]
    pub key: Option<EnvValue>,
}

impl EncryptionConfig {
    pub fn resolve_key(&self) -> Result<SecretString> {
        self.key
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("encryption.key is required".to_string()))?
            .resolve_secret()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    /// Global cap on deployment tasks doing runtime work at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for DeployConfig {
    fn default() -> Self {
        DeployConfig {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_state_path() -> PathBuf {
    PathBuf::from("keel-state.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            runtime: RuntimeConfig::default(),
            proxy: ProxyConfig::default(),
            encryption: EncryptionConfig::default(),
            deploy: DeployConfig::default(),
            state: default_state_path(),
            actor: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, resolving `state` against the file's directory and
    /// applying environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;

        if config.state.is_relative()
            && let Some(dir) = path.parent()
        {
            config.state = dir.join(&config.state);
        }

        config.apply_env_overrides()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply `DOCKER_HOST`, `TRAEFIK_ENABLED`, and `TRAEFIK_NETWORK`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("DOCKER_HOST") {
            match socket_from_docker_host(&host) {
                Some(socket) => self.runtime.socket = Some(socket),
                None if host.trim().is_empty() => {}
                None => tracing::warn!(%host, "ignoring DOCKER_HOST: only unix sockets are supported"),
            }
        }

        if let Ok(enabled) = std::env::var("TRAEFIK_ENABLED") {
            self.proxy.enabled = parse_bool(&enabled).ok_or_else(|| {
                Error::InvalidConfig(format!("TRAEFIK_ENABLED must be true or false, got {enabled:?}"))
            })?;
        }

        if let Ok(network) = std::env::var("TRAEFIK_NETWORK")
            && !network.trim().is_empty()
        {
            self.proxy.network = network.trim().to_string();
        }

        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.deploy.max_concurrent == 0 {
            return Err(Error::InvalidConfig(
                "deploy.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.proxy.enabled && self.proxy.network.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "proxy.network is required when the proxy is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
