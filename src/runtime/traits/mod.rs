// ABOUTME: Composable capability traits for the container runtime port.
// ABOUTME: Defines ImageOps, ContainerOps, NetworkOps, LogOps, and ClusterOps.

mod cluster;
mod container;
mod image;
mod logs;
mod network;
mod shared_types;

pub use cluster::{ClusterError, ClusterOps};
pub use container::{ContainerError, ContainerOps};
pub use image::{ImageError, ImageOps};
pub use logs::{ByteStream, LogError, LogOps, LogOptions};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;

/// Every capability the single-host runtime offers.
pub trait SingleHostRuntime: ImageOps + ContainerOps + NetworkOps + LogOps {}

impl<T: ImageOps + ContainerOps + NetworkOps + LogOps> SingleHostRuntime for T {}

/// Every capability the cluster runtime offers.
pub trait ClusterRuntimeOps: ImageOps + NetworkOps + ClusterOps {}

impl<T: ImageOps + NetworkOps + ClusterOps> ClusterRuntimeOps for T {}
