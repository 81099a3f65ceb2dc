// ABOUTME: Historical record of one deployment attempt.
// ABOUTME: Status only moves forward; a finished record is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::{DeploymentId, ServiceId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Pending,
    /// Reserved for source builds; no execution path reaches it yet.
    Building,
    Deploying,
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// Terminal states are only reachable from `deploying`.
    pub fn can_advance_to(self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, next),
            (Pending, Building)
                | (Pending, Deploying)
                | (Building, Deploying)
                | (Deploying, Success)
                | (Deploying, Failed)
        )
    }

    /// Whether `target` lies on some legal path forward from `self`.
    ///
    /// A stored record may be replaced by one that went through intermediate
    /// states in memory, e.g. `pending` by `failed` via `deploying`.
    pub fn can_reach(self, target: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        self.can_advance_to(target)
            || [Building, Deploying]
                .into_iter()
                .any(|step| self.can_advance_to(step) && step.can_reach(target))
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("deployment {id} already finished as {status}")]
    Finished {
        id: DeploymentId,
        status: DeploymentStatus,
    },

    #[error("deployment {id} cannot move from {from} to {to}")]
    Illegal {
        id: DeploymentId,
        from: DeploymentStatus,
        to: DeploymentStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub service_id: ServiceId,
    /// `None` when the system triggered the deployment.
    #[serde(default)]
    pub triggered_by: Option<UserId>,
    #[serde(default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub commit_message: Option<String>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub logs: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Deployment {
    pub fn pending(service_id: ServiceId, triggered_by: Option<UserId>) -> Self {
        Deployment {
            id: DeploymentId::generate(),
            service_id,
            triggered_by,
            commit_sha: None,
            commit_message: None,
            status: DeploymentStatus::Pending,
            logs: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Move to `next`, stamping `finished_at` when it is terminal.
    pub fn advance(&mut self, next: DeploymentStatus) -> Result<(), TransitionError> {
        if self.is_finished() {
            return Err(TransitionError::Finished {
                id: self.id,
                status: self.status,
            });
        }
        if !self.status.can_advance_to(next) {
            return Err(TransitionError::Illegal {
                id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Check that `next` is a valid replacement for this stored record.
    pub fn check_update(&self, next: &Deployment) -> Result<(), TransitionError> {
        if self.is_finished() {
            if self == next {
                return Ok(());
            }
            return Err(TransitionError::Finished {
                id: self.id,
                status: self.status,
            });
        }
        if self.status != next.status && !self.status.can_reach(next.status) {
            return Err(TransitionError::Illegal {
                id: self.id,
                from: self.status,
                to: next.status,
            });
        }
        Ok(())
    }
}
