// ABOUTME: Command module aggregator for the keel CLI.
// ABOUTME: Re-exports lifecycle, inspection, and administration handlers.

mod admin;
mod context;
mod inspect;
mod lifecycle;

pub use admin::{apply, reconcile, secret};
pub use context::Context;
pub use inspect::{history, labels, logs, status};
pub use lifecycle::{deploy, destroy, restart, scale, start, stop};
