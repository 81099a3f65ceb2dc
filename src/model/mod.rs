// ABOUTME: Records this crate reads and writes through the store port.
// ABOUTME: Services, deployments, domains, projects, and team memberships.

mod deployment;
mod domain;
mod project;
mod restart_policy;
mod service;

pub use deployment::{Deployment, DeploymentStatus, TransitionError};
pub use domain::{Domain, PortMapping, Protocol, Volume};
pub use project::{Membership, Project, TeamRole};
pub use restart_policy::RestartPolicy;
pub use service::{DeployType, RuntimeHandle, Service, ServiceStatus};
