// ABOUTME: In-process WorkloadRuntime that records calls and fails on request.
// ABOUTME: Lets orchestrator tests run without a container engine.

use async_trait::async_trait;
use bytes::Bytes;
use keel::model::RuntimeHandle;
use keel::runtime::{
    ByteStream, ContainerError, ImageError, LogError, LogOptions, NetworkError, RuntimeError,
    RuntimeMode, WorkloadInfo, WorkloadRuntime, WorkloadSpec,
};
use keel::types::{ClusterServiceId, ContainerId, ImageRef};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Pull(String),
    ValidateNetwork(String),
    Create(String),
    Start(RuntimeHandle, u32),
    Stop(RuntimeHandle),
    Restart(RuntimeHandle),
    Remove(RuntimeHandle),
    Inspect(RuntimeHandle),
    Logs(RuntimeHandle, LogOptions),
    Scale(RuntimeHandle, u32),
}

/// Operations that can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Pull,
    Create,
    Start,
    Stop,
    Remove,
    Inspect,
    Logs,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    specs: Vec<WorkloadSpec>,
    failing: HashSet<Op>,
    networks: HashSet<String>,
    log_chunks: Vec<Bytes>,
    next_id: u32,
}

pub struct FakeRuntime {
    mode: RuntimeMode,
    state: Mutex<State>,
    pull_gate: Option<Arc<Notify>>,
}

impl FakeRuntime {
    pub fn new(mode: RuntimeMode) -> Self {
        FakeRuntime {
            mode,
            state: Mutex::new(State::default()),
            pull_gate: None,
        }
    }

    pub fn single_host() -> Self {
        Self::new(RuntimeMode::SingleHost)
    }

    /// Make every pull wait for one `notify_one` on the returned handle.
    pub fn with_pull_gate(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.pull_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().networks.insert(name.to_string());
        self
    }

    pub fn fail(&self, op: Op) {
        self.state.lock().failing.insert(op);
    }

    /// Serve `chunks` from every log request.
    pub fn set_logs(&self, chunks: Vec<Bytes>) {
        self.state.lock().log_chunks = chunks;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn specs(&self) -> Vec<WorkloadSpec> {
        self.state.lock().specs.clone()
    }

    fn record(&self, call: Call, op: Option<Op>) -> bool {
        let mut state = self.state.lock();
        state.calls.push(call);
        op.is_some_and(|op| state.failing.contains(&op))
    }
}

#[async_trait]
impl WorkloadRuntime for FakeRuntime {
    fn mode(&self) -> RuntimeMode {
        self.mode
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), RuntimeError> {
        if let Some(gate) = &self.pull_gate {
            gate.notified().await;
        }
        if self.record(Call::Pull(image.to_string()), Some(Op::Pull)) {
            return Err(ImageError::PullFailed(format!("manifest unknown: {image}")).into());
        }
        Ok(())
    }

    async fn validate_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::ValidateNetwork(name.to_string()), None);
        if self.state.lock().networks.contains(name) {
            Ok(())
        } else {
            Err(NetworkError::NotFound(name.to_string()).into())
        }
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle, RuntimeError> {
        if self.record(Call::Create(spec.config.name.clone()), Some(Op::Create)) {
            return Err(ContainerError::AlreadyExists(spec.config.name.clone()).into());
        }
        let mut state = self.state.lock();
        state.specs.push(spec.clone());
        state.next_id += 1;
        let id = format!("w{}", state.next_id);
        Ok(match self.mode {
            RuntimeMode::SingleHost => RuntimeHandle::Container(ContainerId::new(id)),
            RuntimeMode::Cluster => RuntimeHandle::ClusterService(ClusterServiceId::new(id)),
        })
    }

    async fn start(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        if self.record(Call::Start(handle.clone(), replicas), Some(Op::Start)) {
            return Err(ContainerError::Runtime("port is already allocated".to_string()).into());
        }
        Ok(())
    }

    async fn stop(
        &self,
        handle: &RuntimeHandle,
        _timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        if self.record(Call::Stop(handle.clone()), Some(Op::Stop)) {
            return Err(ContainerError::NotRunning(handle.to_string()).into());
        }
        Ok(())
    }

    async fn restart(
        &self,
        handle: &RuntimeHandle,
        _timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        self.record(Call::Restart(handle.clone()), None);
        Ok(())
    }

    async fn remove(&self, handle: &RuntimeHandle, _force: bool) -> Result<(), RuntimeError> {
        if self.record(Call::Remove(handle.clone()), Some(Op::Remove)) {
            return Err(ContainerError::Runtime("device or resource busy".to_string()).into());
        }
        Ok(())
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<WorkloadInfo, RuntimeError> {
        if self.record(Call::Inspect(handle.clone()), Some(Op::Inspect)) {
            return Err(ContainerError::NotFound(handle.to_string()).into());
        }
        Ok(WorkloadInfo {
            state: "running".to_string(),
            status: "running".to_string(),
        })
    }

    async fn logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> Result<ByteStream, RuntimeError> {
        if self.record(Call::Logs(handle.clone(), opts.clone()), Some(Op::Logs)) {
            return Err(LogError::NotFound(handle.to_string()).into());
        }
        let chunks = self.state.lock().log_chunks.clone();
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn scale(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        self.record(Call::Scale(handle.clone(), replicas), None);
        Ok(())
    }
}
