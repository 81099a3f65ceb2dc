// ABOUTME: Runtime mode and connection settings.
// ABOUTME: Single-host runs plain containers; cluster runs replicated services.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default engine socket when nothing else is configured.
pub const DEFAULT_SOCKET: &str = "/var/run/docker.sock";

/// How workloads are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeMode {
    #[default]
    SingleHost,
    Cluster,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::SingleHost => write!(f, "single-host"),
            RuntimeMode::Cluster => write!(f, "cluster"),
        }
    }
}

/// Runtime section of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub mode: RuntimeMode,
    /// Engine socket path. `DOCKER_HOST` overrides it when set.
    #[serde(default)]
    pub socket: Option<String>,
    /// Grace period for stop and restart. Engine default when unset.
    #[serde(default, with = "humantime_serde")]
    pub stop_timeout: Option<Duration>,
}

impl RuntimeConfig {
    /// Socket path to connect to.
    pub fn socket_path(&self) -> &str {
        self.socket.as_deref().unwrap_or(DEFAULT_SOCKET)
    }
}

/// Convert a `DOCKER_HOST` value into a socket path.
///
/// Only `unix://` hosts (or bare paths) are supported; anything else yields `None`.
pub fn socket_from_docker_host(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.strip_prefix("unix://") {
        Some(path) => Some(path.to_string()),
        None if value.starts_with('/') => Some(value.to_string()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_host_strips_unix_scheme() {
        assert_eq!(
            socket_from_docker_host("unix:///run/user/1000/docker.sock").as_deref(),
            Some("/run/user/1000/docker.sock")
        );
        assert_eq!(
            socket_from_docker_host("/var/run/docker.sock").as_deref(),
            Some("/var/run/docker.sock")
        );
        assert_eq!(socket_from_docker_host("tcp://10.0.0.1:2375"), None);
        assert_eq!(socket_from_docker_host(""), None);
    }

    #[test]
    fn runtime_config_parses_humantime_timeout() {
        let cfg: RuntimeConfig =
            serde_yaml::from_str("mode: cluster\nstop_timeout: 20s\n").unwrap();
        assert_eq!(cfg.mode, RuntimeMode::Cluster);
        assert_eq!(cfg.stop_timeout, Some(Duration::from_secs(20)));
        assert_eq!(cfg.socket_path(), DEFAULT_SOCKET);
    }
}
