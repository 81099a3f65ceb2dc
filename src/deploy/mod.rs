// ABOUTME: Deployment state machine and orchestrator.
// ABOUTME: Typestate attempts, detached deployment tasks, bounded log capture, and reconciliation.

mod attempt;
mod error;
mod logs;
mod orchestrator;
mod reconcile;
mod state;
mod task;

pub use attempt::Attempt;
pub use error::{DeployError, DeployErrorKind};
pub use logs::{CapturedLogs, DEFAULT_TAIL, MAX_LOG_BYTES, read_capped};
pub use orchestrator::{Orchestrator, OrchestratorSettings, ServiceReport};
pub use reconcile::ReconcileReport;
pub use state::{Deploying, Finished, Pending};
pub use task::DeploymentTask;
