// ABOUTME: Hostnames routed to a service, and the port/volume data attached to it.
// ABOUTME: Uniqueness of a hostname is owned by the store, not by this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DomainId, ServiceId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub service_id: ServiceId,
    pub hostname: String,
    #[serde(default)]
    pub ssl_enabled: bool,
    /// Provision a certificate automatically (only meaningful with SSL).
    #[serde(default)]
    pub ssl_auto: bool,
    pub created_at: DateTime<Utc>,
}

impl Domain {
    pub fn new(service_id: ServiceId, hostname: impl Into<String>) -> Self {
        Domain {
            id: DomainId::generate(),
            service_id,
            hostname: hostname.into(),
            ssl_enabled: false,
            ssl_auto: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_ssl(mut self, auto: bool) -> Self {
        self.ssl_enabled = true;
        self.ssl_auto = auto;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub service_id: ServiceId,
    pub container_port: u16,
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub service_id: ServiceId,
    /// Named volume, used when no host path is given.
    pub name: String,
    pub mount_path: String,
    #[serde(default)]
    pub host_path: Option<String>,
}
