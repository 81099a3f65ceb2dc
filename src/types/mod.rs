// ABOUTME: Type-safe identifiers and validated value types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod hostname;
mod id;
mod image_ref;
mod slug;

pub use hostname::{Hostname, HostnameError};
pub use id::{
    ClusterServiceId, ContainerId, DeploymentId, DomainId, EntityId, Id, NetworkId, ProjectId,
    ServiceId, TeamId, UserId,
};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use slug::{Slug, SlugError};
