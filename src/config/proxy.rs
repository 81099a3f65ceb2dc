// ABOUTME: Reverse-proxy integration settings.
// ABOUTME: Names the shared network, entrypoints, and certificate resolver used in labels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Emit routing labels and attach workloads to the proxy network.
    pub enabled: bool,
    /// Network shared between the proxy and routed workloads.
    pub network: String,
    /// Plain HTTP entrypoint.
    pub entrypoint: String,
    /// TLS entrypoint.
    pub secure_entrypoint: String,
    pub cert_resolver: String,
    /// Prefix for router, middleware, and backend names.
    pub router_prefix: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            enabled: true,
            network: "keel_traefik".to_string(),
            entrypoint: "web".to_string(),
            secure_entrypoint: "websecure".to_string(),
            cert_resolver: "letsencrypt".to_string(),
            router_prefix: "keel".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Settings with routing turned off.
    pub fn disabled() -> Self {
        ProxyConfig {
            enabled: false,
            ..Default::default()
        }
    }
}
