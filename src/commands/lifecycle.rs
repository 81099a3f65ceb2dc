// ABOUTME: Deploy, start, stop, restart, destroy, and scale commands.
// ABOUTME: Each resolves the service, calls the orchestrator, and saves the snapshot.

use keel::error::{Error, Result};
use keel::model::DeploymentStatus;

use super::context::Context;

/// Deploy and follow the task until it finishes.
pub async fn deploy(ctx: &mut Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    let orchestrator = ctx.orchestrator()?;

    ctx.output.start_timer();
    let (pending, task) = orchestrator.deploy(actor, service_id).await?;
    ctx.output
        .progress(&format!("Deployment {} accepted", pending.id));
    ctx.save()?;

    let mut status = task.subscribe();
    let follow = async {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            ctx.output.progress(&format!("  → {current}"));
            if current.is_terminal() {
                break;
            }
        }
    };
    let (_, outcome) = tokio::join!(follow, task.wait());
    let deployment = outcome?;
    ctx.save()?;

    match deployment.status {
        DeploymentStatus::Success => {
            ctx.output.success(&format!("Deployment {} succeeded", deployment.id));
            Ok(())
        }
        _ => Err(Error::DeploymentFailed {
            id: deployment.id,
            reason: deployment.logs.unwrap_or_default(),
        }),
    }
}

pub async fn start(ctx: &mut Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    ctx.orchestrator()?.start(actor, service_id).await?;
    ctx.save()?;
    ctx.output.success(&format!("Started {service}"));
    Ok(())
}

pub async fn stop(ctx: &mut Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    ctx.orchestrator()?.stop(actor, service_id).await?;
    ctx.save()?;
    ctx.output.success(&format!("Stopped {service}"));
    Ok(())
}

pub async fn restart(ctx: &mut Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    ctx.orchestrator()?.restart(actor, service_id).await?;
    ctx.output.success(&format!("Restarted {service}"));
    Ok(())
}

pub async fn destroy(ctx: &mut Context, service: &str) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    ctx.orchestrator()?.destroy(actor, service_id).await?;
    ctx.save()?;
    ctx.output.success(&format!("Destroyed workload of {service}"));
    Ok(())
}

pub async fn scale(ctx: &mut Context, service: &str, replicas: u32) -> Result<()> {
    let actor = ctx.actor()?;
    let service_id = ctx.resolve_service(service)?;
    ctx.orchestrator()?
        .scale(actor, service_id, replicas)
        .await?;
    ctx.save()?;
    ctx.output
        .success(&format!("Scaled {service} to {replicas} replica(s)"));
    Ok(())
}
