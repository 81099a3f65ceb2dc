// ABOUTME: Cluster runtime backed by the engine's replicated-service API.
// ABOUTME: Service logs are read over a raw HTTP connection to the engine socket.

use crate::model::{Protocol, RestartPolicy, RuntimeHandle};
use crate::runtime::bollard::{BollardRuntime, connect_client, engine_mount};
use crate::runtime::error::RuntimeError;
use crate::runtime::traits::{
    ByteStream, ClusterError, ClusterOps, ClusterServiceInfo, ContainerConfig, ImageError,
    ImageOps, LogError, LogOptions, NetworkError, NetworkOps,
};
use crate::runtime::types::RuntimeMode;
use crate::runtime::workload::{WorkloadInfo, WorkloadRuntime, WorkloadSpec};
use crate::types::{ClusterServiceId, ImageRef};
use async_trait::async_trait;
use bollard::models::{
    EndpointPortConfig, EndpointPortConfigProtocolEnum, EndpointSpec, Limit,
    NetworkAttachmentConfig, ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated, TaskSpec,
    TaskSpecContainerSpec, TaskSpecResources, TaskSpecRestartPolicy,
    TaskSpecRestartPolicyConditionEnum,
};
use bollard::query_parameters::{InspectServiceOptions, UpdateServiceOptions};
use bytes::{Buf, Bytes, BytesMut};
use futures::StreamExt;
use http_body_util::{BodyExt, BodyStream};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::UnixStream;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_service_error(e: bollard::errors::Error) -> ClusterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => ClusterError::NotFound(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => ClusterError::AlreadyExists(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 503 => ClusterError::NotClustered(message.clone()),
        _ => ClusterError::Runtime(e.to_string()),
    }
}

fn restart_condition(policy: RestartPolicy) -> TaskSpecRestartPolicy {
    let (condition, max_attempts) = match policy {
        RestartPolicy::No => (TaskSpecRestartPolicyConditionEnum::NONE, None),
        RestartPolicy::Always | RestartPolicy::UnlessStopped => {
            (TaskSpecRestartPolicyConditionEnum::ANY, None)
        }
        RestartPolicy::OnFailure { max_retries } => (
            TaskSpecRestartPolicyConditionEnum::ON_FAILURE,
            max_retries.map(i64::from),
        ),
    };
    TaskSpecRestartPolicy {
        condition: Some(condition),
        max_attempts,
        ..Default::default()
    }
}

/// Build the engine's service spec from a container configuration.
fn service_spec(config: &ContainerConfig, replicas: u64) -> ServiceSpec {
    let env: Vec<String> = config
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mounts: Vec<_> = config
        .volumes
        .iter()
        .map(|m| engine_mount(&m.source, &m.target))
        .collect();

    let container_spec = TaskSpecContainerSpec {
        image: Some(config.image.to_string()),
        env: if env.is_empty() { None } else { Some(env) },
        mounts: if mounts.is_empty() { None } else { Some(mounts) },
        ..Default::default()
    };

    let resources = TaskSpecResources {
        limits: Some(Limit {
            nano_cpus: config.resources.nano_cpus(),
            memory_bytes: config.resources.memory_bytes(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let networks = config.network.as_ref().map(|network| {
        vec![NetworkAttachmentConfig {
            target: Some(network.clone()),
            ..Default::default()
        }]
    });

    let ports: Vec<EndpointPortConfig> = config
        .ports
        .iter()
        .map(|p| EndpointPortConfig {
            protocol: Some(match p.protocol {
                Protocol::Tcp => EndpointPortConfigProtocolEnum::TCP,
                Protocol::Udp => EndpointPortConfigProtocolEnum::UDP,
            }),
            target_port: Some(i64::from(p.container_port)),
            published_port: p.host_port.map(i64::from),
            ..Default::default()
        })
        .collect();

    ServiceSpec {
        name: Some(config.name.clone()),
        labels: Some(
            config
                .labels
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        task_template: Some(TaskSpec {
            container_spec: Some(container_spec),
            resources: Some(resources),
            restart_policy: Some(restart_condition(config.restart_policy)),
            networks,
            ..Default::default()
        }),
        mode: Some(replicated(replicas)),
        endpoint_spec: if ports.is_empty() {
            None
        } else {
            Some(EndpointSpec {
                ports: Some(ports),
                ..Default::default()
            })
        },
        ..Default::default()
    }
}

fn replicated(replicas: u64) -> ServiceSpecMode {
    ServiceSpecMode {
        replicated: Some(ServiceSpecModeReplicated {
            replicas: Some(i64::try_from(replicas).unwrap_or(i64::MAX)),
        }),
        ..Default::default()
    }
}

// =============================================================================
// Log Frame Decoding
// =============================================================================

const FRAME_HEADER_LEN: usize = 8;

/// Splits the engine's multiplexed log stream into payload chunks.
///
/// Each frame is an 8-byte header (stream type, three zero bytes, big-endian
/// length) followed by the payload. Services running with a TTY send raw
/// bytes instead, which is detected from the first header.
#[derive(Debug, Default)]
pub(crate) struct LogFrameDecoder {
    buf: BytesMut,
    raw: Option<bool>,
}

impl LogFrameDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete payload, if one is buffered.
    pub(crate) fn next_payload(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }

        let raw = match self.raw {
            Some(raw) => raw,
            None if self.buf.len() < FRAME_HEADER_LEN => return None,
            None => {
                let multiplexed = self.buf[0] <= 2 && self.buf[1..4] == [0, 0, 0];
                self.raw = Some(!multiplexed);
                !multiplexed
            }
        };

        if raw {
            return Some(self.buf.split().freeze());
        }

        if self.buf.len() < FRAME_HEADER_LEN {
            return None;
        }
        let len = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        if self.buf.len() < FRAME_HEADER_LEN + len {
            return None;
        }
        self.buf.advance(FRAME_HEADER_LEN);
        Some(self.buf.split_to(len).freeze())
    }

    /// Whatever is left once the stream has ended.
    pub(crate) fn finish(&mut self) -> Option<Bytes> {
        if self.buf.is_empty() {
            return None;
        }
        if self.raw == Some(false) {
            tracing::debug!(bytes = self.buf.len(), "discarding truncated log frame");
            self.buf.clear();
            return None;
        }
        Some(self.buf.split().freeze())
    }
}

// =============================================================================
// ClusterRuntime
// =============================================================================

/// Cluster runtime: one replicated service per service record.
pub struct ClusterRuntime {
    engine: BollardRuntime,
    socket_path: String,
}

impl ClusterRuntime {
    /// Connect to a cluster manager's engine socket.
    pub fn connect(socket_path: &str) -> Result<Self, RuntimeError> {
        let client = connect_client(socket_path)?;
        Ok(Self {
            engine: BollardRuntime::new(client),
            socket_path: socket_path.to_string(),
        })
    }

    fn service_id<'a>(
        &self,
        handle: &'a RuntimeHandle,
    ) -> Result<&'a ClusterServiceId, RuntimeError> {
        match handle {
            RuntimeHandle::ClusterService(id) => Ok(id),
            other => Err(RuntimeError::HandleMismatch {
                handle: other.clone(),
                mode: RuntimeMode::Cluster,
            }),
        }
    }

    async fn inspect_raw(
        &self,
        id: &ClusterServiceId,
    ) -> Result<(ServiceSpec, u64), ClusterError> {
        let service = self
            .engine
            .client()
            .inspect_service(id.as_str(), None::<InspectServiceOptions>)
            .await
            .map_err(map_service_error)?;

        let version = service
            .version
            .and_then(|v| v.index)
            .ok_or_else(|| ClusterError::Runtime(format!("service {} has no version", id)))?;
        let spec = service
            .spec
            .ok_or_else(|| ClusterError::Runtime(format!("service {} has no spec", id)))?;
        Ok((spec, version))
    }

    async fn push_spec(
        &self,
        id: &ClusterServiceId,
        spec: ServiceSpec,
        version: u64,
    ) -> Result<(), ClusterError> {
        let opts = UpdateServiceOptions {
            version: version
                .try_into()
                .map_err(|_| ClusterError::Runtime(format!("service version {} out of range", version)))?,
            ..Default::default()
        };

        self.engine
            .client()
            .update_service(id.as_str(), spec, opts, None)
            .await
            .map_err(map_service_error)?;
        Ok(())
    }

    /// Open a raw HTTP connection to the engine and request service logs.
    async fn request_logs(&self, path: &str) -> Result<ByteStream, LogError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            LogError::StreamError(format!("failed to connect to socket: {}", e))
        })?;

        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| LogError::StreamError(format!("HTTP handshake failed: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::warn!("service log connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", "localhost")
            .body(http_body_util::Empty::<Bytes>::new())
            .map_err(|e| LogError::StreamError(format!("failed to build request: {}", e)))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| LogError::StreamError(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| LogError::StreamError(format!("failed to read error response: {}", e)))?
                .to_bytes();
            let text = String::from_utf8_lossy(&body).trim().to_string();
            if status == hyper::StatusCode::NOT_FOUND {
                return Err(LogError::NotFound(text));
            }
            return Err(LogError::StreamError(format!("engine returned {}: {}", status, text)));
        }

        let body = Box::pin(BodyStream::new(resp.into_body()));
        let chunks = futures::stream::unfold(
            (body, LogFrameDecoder::default(), false),
            |(mut body, mut decoder, done)| async move {
                loop {
                    if let Some(payload) = decoder.next_payload() {
                        return Some((Ok(payload), (body, decoder, done)));
                    }
                    if done {
                        return None;
                    }
                    match body.next().await {
                        Some(Ok(frame)) => {
                            if let Ok(data) = frame.into_data() {
                                decoder.push(&data);
                            }
                        }
                        Some(Err(e)) => {
                            return Some((
                                Err(LogError::StreamError(e.to_string())),
                                (body, decoder, true),
                            ));
                        }
                        None => {
                            return decoder
                                .finish()
                                .map(|rest| (Ok(rest), (body, decoder, true)));
                        }
                    }
                }
            },
        );

        Ok(Box::pin(chunks))
    }
}

#[async_trait]
impl ImageOps for ClusterRuntime {
    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        ImageOps::pull_image(&self.engine, reference).await
    }
}

#[async_trait]
impl NetworkOps for ClusterRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        self.engine.network_exists(name).await
    }
}

#[async_trait]
impl ClusterOps for ClusterRuntime {
    async fn create_service(
        &self,
        config: &ContainerConfig,
        replicas: u64,
    ) -> Result<ClusterServiceId, ClusterError> {
        let response = self
            .engine
            .client()
            .create_service(service_spec(config, replicas), None)
            .await
            .map_err(map_service_error)?;

        for warning in response.warnings.unwrap_or_default() {
            tracing::warn!(service = %config.name, "{}", warning);
        }

        response
            .id
            .map(ClusterServiceId::new)
            .ok_or_else(|| ClusterError::Runtime(format!("engine returned no id for {}", config.name)))
    }

    async fn remove_service(&self, id: &ClusterServiceId) -> Result<(), ClusterError> {
        self.engine
            .client()
            .delete_service(id.as_str())
            .await
            .map_err(map_service_error)
    }

    async fn scale_service(
        &self,
        id: &ClusterServiceId,
        replicas: u64,
    ) -> Result<(), ClusterError> {
        let (mut spec, version) = self.inspect_raw(id).await?;
        spec.mode = Some(replicated(replicas));
        self.push_spec(id, spec, version).await
    }

    async fn restart_service(&self, id: &ClusterServiceId) -> Result<(), ClusterError> {
        let (mut spec, version) = self.inspect_raw(id).await?;
        let template = spec.task_template.get_or_insert_with(TaskSpec::default);
        template.force_update = Some(template.force_update.unwrap_or(0) + 1);
        self.push_spec(id, spec, version).await
    }

    async fn inspect_service(
        &self,
        id: &ClusterServiceId,
    ) -> Result<ClusterServiceInfo, ClusterError> {
        let (spec, version) = self.inspect_raw(id).await?;
        let replicas = spec
            .mode
            .and_then(|m| m.replicated)
            .and_then(|r| r.replicas)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        Ok(ClusterServiceInfo {
            id: id.clone(),
            name: spec.name.unwrap_or_default(),
            replicas,
            version,
        })
    }

    async fn service_logs(
        &self,
        id: &ClusterServiceId,
        opts: &LogOptions,
    ) -> Result<ByteStream, ClusterError> {
        let mut path = format!(
            "/services/{}/logs?stdout=true&stderr=true&follow={}&tail={}",
            urlencoding::encode(id.as_str()),
            opts.follow,
            urlencoding::encode(&opts.tail_param()?),
        );
        if let Some(since) = opts.since_unix(chrono::Utc::now())? {
            path.push_str(&format!("&since={}", since));
        }

        self.request_logs(&path).await.map_err(|e| match e {
            LogError::NotFound(msg) => ClusterError::NotFound(msg),
            other => ClusterError::Logs(other),
        })
    }
}

#[async_trait]
impl WorkloadRuntime for ClusterRuntime {
    fn mode(&self) -> RuntimeMode {
        RuntimeMode::Cluster
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), RuntimeError> {
        Ok(ImageOps::pull_image(self, image).await?)
    }

    async fn validate_network(&self, name: &str) -> Result<(), RuntimeError> {
        Ok(NetworkOps::validate_network(self, name).await?)
    }

    async fn create_workload(&self, spec: &WorkloadSpec) -> Result<RuntimeHandle, RuntimeError> {
        let id = self
            .create_service(&spec.config, u64::from(spec.replicas))
            .await?;
        Ok(RuntimeHandle::ClusterService(id))
    }

    async fn start(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.scale_service(id, u64::from(replicas.max(1))).await?)
    }

    async fn stop(
        &self,
        handle: &RuntimeHandle,
        _timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.scale_service(id, 0).await?)
    }

    async fn restart(
        &self,
        handle: &RuntimeHandle,
        _timeout: Option<Duration>,
    ) -> Result<(), RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.restart_service(id).await?)
    }

    async fn remove(&self, handle: &RuntimeHandle, _force: bool) -> Result<(), RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.remove_service(id).await?)
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> Result<WorkloadInfo, RuntimeError> {
        let id = self.service_id(handle)?;
        let info = self.inspect_service(id).await?;
        let state = if info.replicas > 0 {
            "running"
        } else {
            "scaled-down"
        };
        Ok(WorkloadInfo {
            state: state.to_string(),
            status: format!("{} replicas", info.replicas),
        })
    }

    async fn logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> Result<ByteStream, RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.service_logs(id, opts).await?)
    }

    async fn scale(&self, handle: &RuntimeHandle, replicas: u32) -> Result<(), RuntimeError> {
        let id = self.service_id(handle)?;
        Ok(self.scale_service(id, u64::from(replicas)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::traits::{PortMapping, ResourceLimits};
    use std::collections::BTreeMap;

    fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decoder_strips_frame_headers_across_chunk_boundaries() {
        let mut bytes = frame(1, b"hello\n");
        bytes.extend(frame(2, b"oops\n"));

        let mut decoder = LogFrameDecoder::default();
        let (first, second) = bytes.split_at(10);
        decoder.push(first);
        assert_eq!(decoder.next_payload(), None);
        decoder.push(second);

        assert_eq!(decoder.next_payload().as_deref(), Some(&b"hello\n"[..]));
        assert_eq!(decoder.next_payload().as_deref(), Some(&b"oops\n"[..]));
        assert_eq!(decoder.next_payload(), None);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn decoder_passes_tty_output_through() {
        let mut decoder = LogFrameDecoder::default();
        decoder.push(b"plain tty output\n");
        assert_eq!(
            decoder.next_payload().as_deref(),
            Some(&b"plain tty output\n"[..])
        );
    }

    #[test]
    fn decoder_flushes_short_raw_tail_at_end() {
        let mut decoder = LogFrameDecoder::default();
        decoder.push(b"hi\n");
        assert_eq!(decoder.next_payload(), None);
        assert_eq!(decoder.finish().as_deref(), Some(&b"hi\n"[..]));
    }

    #[test]
    fn service_spec_carries_limits_policy_and_network() {
        let config = ContainerConfig {
            name: "keel-api".to_string(),
            image: "nginx:1.27".parse().unwrap(),
            env: BTreeMap::from([("PORT".to_string(), "80".to_string())]),
            labels: BTreeMap::from([("keel.managed".to_string(), "true".to_string())]),
            ports: vec![PortMapping {
                host_port: Some(8080),
                container_port: 80,
                protocol: Protocol::Tcp,
            }],
            volumes: Vec::new(),
            restart_policy: RestartPolicy::UnlessStopped,
            resources: ResourceLimits {
                memory: Some(128 * 1024 * 1024),
                cpus: Some(1.5),
            },
            network: Some("keel_traefik".to_string()),
        };

        let spec = service_spec(&config, 3);
        assert_eq!(spec.name.as_deref(), Some("keel-api"));
        assert_eq!(
            spec.mode.and_then(|m| m.replicated).and_then(|r| r.replicas),
            Some(3)
        );

        let template = spec.task_template.unwrap();
        let limits = template.resources.unwrap().limits.unwrap();
        assert_eq!(limits.nano_cpus, Some(1_500_000_000));
        assert_eq!(limits.memory_bytes, Some(134_217_728));
        assert_eq!(
            template.restart_policy.unwrap().condition,
            Some(TaskSpecRestartPolicyConditionEnum::ANY)
        );
        assert_eq!(
            template.networks.unwrap()[0].target.as_deref(),
            Some("keel_traefik")
        );
        assert_eq!(
            template.container_spec.unwrap().env,
            Some(vec!["PORT=80".to_string()])
        );
        let ports = spec.endpoint_spec.unwrap().ports.unwrap();
        assert_eq!(ports[0].published_port, Some(8080));
    }

    #[test]
    fn restart_policy_maps_to_task_conditions() {
        assert_eq!(
            restart_condition(RestartPolicy::No).condition,
            Some(TaskSpecRestartPolicyConditionEnum::NONE)
        );
        let on_failure = restart_condition(RestartPolicy::OnFailure {
            max_retries: Some(3),
        });
        assert_eq!(
            on_failure.condition,
            Some(TaskSpecRestartPolicyConditionEnum::ON_FAILURE)
        );
        assert_eq!(on_failure.max_attempts, Some(3));
    }
}
