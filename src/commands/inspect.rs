// ABOUTME: Read-only commands: status, logs, deployment history, label preview.
// ABOUTME: None of these write the state snapshot.

use keel::error::Result;
use keel::labels::build_labels;
use keel::model::Deployment;
use keel::store::Store;
use serde_json::json;
use std::io::Write;

use super::context::Context;

fn describe(deployment: &Deployment) -> String {
    let finished = deployment
        .finished_at
        .map(|t| format!(", finished {}", t.to_rfc3339()))
        .unwrap_or_default();
    format!(
        "{} {} (started {}{finished})",
        deployment.id,
        deployment.status,
        deployment.started_at.to_rfc3339()
    )
}

pub async fn status(ctx: &Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    let report = ctx.orchestrator()?.status(actor, service_id).await?;

    let mut lines = vec![
        format!("Service: {} ({})", report.service.name, report.service.slug),
        format!("Status: {}", report.service.status),
        format!("Replicas: {}", report.service.replicas),
    ];
    if let Some(image) = report.service.image() {
        lines.push(format!("Image: {image}"));
    }
    match (&report.service.runtime_handle, &report.workload) {
        (Some(handle), Some(workload)) => {
            lines.push(format!("Workload: {handle} {}", workload.status));
        }
        (Some(handle), None) => lines.push(format!("Workload: {handle} (missing)")),
        (None, _) => lines.push("Workload: none".to_string()),
    }
    if let Some(latest) = &report.latest {
        lines.push(format!("Latest deployment: {}", describe(latest)));
    }

    let data = json!({
        "service": report.service,
        "workload": report.workload.as_ref().map(|w| json!({ "state": w.state, "status": w.status })),
        "latest": report.latest,
    });
    ctx.output.result(&lines.join("\n"), &data);
    Ok(())
}

pub async fn logs(
    ctx: &Context,
    service: &str,
    tail: Option<&str>,
    since: Option<&str>,
) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    let logs = ctx
        .orchestrator()?
        .logs(actor, service_id, tail, since)
        .await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&logs.bytes)?;
    stdout.flush()?;
    if logs.truncated {
        ctx.output.progress("(output truncated)");
    }
    Ok(())
}

pub async fn history(ctx: &Context, service: &str, limit: usize) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    let deployments = ctx
        .orchestrator()?
        .list_deployments(actor, service_id, limit)
        .await?;

    let human = if deployments.is_empty() {
        "No deployments".to_string()
    } else {
        deployments
            .iter()
            .map(describe)
            .collect::<Vec<_>>()
            .join("\n")
    };
    ctx.output.result(&human, &deployments);
    Ok(())
}

/// Preview the label map without touching the engine.
pub async fn labels(ctx: &Context, service: &str) -> Result<()> {
    let service_id = ctx.resolve_service(service)?;
    let service = ctx.store.get_service(service_id).await?;
    let domains = ctx.store.list_domains(service_id).await?;
    let labels = build_labels(&service, &domains, &ctx.config.proxy);

    let human = labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");
    ctx.output.result(&human, &labels);
    Ok(())
}
