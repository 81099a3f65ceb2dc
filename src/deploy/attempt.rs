// ABOUTME: One deployment attempt, parameterized by its lifecycle state.
// ABOUTME: Wraps the persisted Deployment record and only exposes legal transitions.

use std::marker::PhantomData;

use crate::model::{Deployment, DeploymentStatus, ServiceStatus, TransitionError};
use crate::types::{DeploymentId, ServiceId, UserId};

use super::state::{Deploying, Finished, Pending};

/// A deployment attempt in state `S`.
///
/// There is no transition into `building`: source builds are not executed,
/// so an attempt goes straight from pending to deploying.
#[derive(Debug)]
pub struct Attempt<S> {
    record: Deployment,
    _state: PhantomData<S>,
}

impl<S> Attempt<S> {
    fn advance<T>(mut self, next: DeploymentStatus) -> Result<Attempt<T>, TransitionError> {
        self.record.advance(next)?;
        Ok(Attempt {
            record: self.record,
            _state: PhantomData,
        })
    }

    pub fn id(&self) -> DeploymentId {
        self.record.id
    }

    pub fn service_id(&self) -> ServiceId {
        self.record.service_id
    }

    pub fn record(&self) -> &Deployment {
        &self.record
    }
}

impl Attempt<Pending> {
    pub fn new(service_id: ServiceId, triggered_by: Option<UserId>) -> Self {
        Attempt {
            record: Deployment::pending(service_id, triggered_by),
            _state: PhantomData,
        }
    }

    /// Enter runtime execution.
    pub fn begin(self) -> Result<Attempt<Deploying>, TransitionError> {
        self.advance(DeploymentStatus::Deploying)
    }
}

impl Attempt<Deploying> {
    pub fn succeed(self) -> Result<Attempt<Finished>, TransitionError> {
        self.advance(DeploymentStatus::Success)
    }

    /// Record the failure reason in the deployment logs.
    pub fn fail(mut self, reason: impl Into<String>) -> Result<Attempt<Finished>, TransitionError> {
        self.record.logs = Some(reason.into());
        self.advance(DeploymentStatus::Failed)
    }
}

impl Attempt<Finished> {
    /// Service status matching this outcome.
    pub fn service_status(&self) -> ServiceStatus {
        match self.record.status {
            DeploymentStatus::Success => ServiceStatus::Running,
            _ => ServiceStatus::Failed,
        }
    }

    pub fn into_record(self) -> Deployment {
        self.record
    }
}

/// Fail a record left unfinished by a task that no longer exists.
///
/// Pending records pass through `deploying` first so the status sequence
/// stays a legal one.
pub(crate) fn abandon(
    record: Deployment,
    reason: &str,
) -> Result<Attempt<Finished>, TransitionError> {
    let attempt: Attempt<Deploying> = match record.status {
        DeploymentStatus::Pending => Attempt::<Pending> {
            record,
            _state: PhantomData,
        }
        .begin()?,
        _ => Attempt {
            record,
            _state: PhantomData,
        },
    };
    attempt.fail(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_maps_to_running() {
        let finished = Attempt::new(ServiceId::generate(), None)
            .begin()
            .unwrap()
            .succeed()
            .unwrap();
        assert_eq!(finished.record().status, DeploymentStatus::Success);
        assert!(finished.record().finished_at.is_some());
        assert_eq!(finished.service_status(), ServiceStatus::Running);
    }

    #[test]
    fn failure_keeps_reason_in_logs() {
        let finished = Attempt::new(ServiceId::generate(), None)
            .begin()
            .unwrap()
            .fail("pull failed: nginx:nope")
            .unwrap();
        assert_eq!(finished.record().status, DeploymentStatus::Failed);
        assert_eq!(
            finished.record().logs.as_deref(),
            Some("pull failed: nginx:nope")
        );
        assert_eq!(finished.service_status(), ServiceStatus::Failed);
    }

    #[test]
    fn abandoning_pending_passes_through_deploying() {
        let record = Deployment::pending(ServiceId::generate(), None);
        let finished = abandon(record, "interrupted").unwrap();
        assert_eq!(finished.record().status, DeploymentStatus::Failed);
    }

    #[test]
    fn abandoning_finished_record_is_rejected() {
        let finished = Attempt::new(ServiceId::generate(), None)
            .begin()
            .unwrap()
            .succeed()
            .unwrap()
            .into_record();
        assert!(matches!(
            abandon(finished, "interrupted"),
            Err(TransitionError::Finished { .. })
        ));
    }
}
