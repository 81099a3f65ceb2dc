// ABOUTME: Administrative commands: manifest apply, reconciliation, secret tooling.
// ABOUTME: Reconcile runs without an actor; it only repairs records.

use keel::crypto::SecretCodec;
use keel::error::Result;
use keel::manifest::Manifest;
use keel::output::Output;
use std::path::Path;

use crate::cli::SecretAction;

use super::context::Context;

pub async fn apply(ctx: &Context, file: &Path) -> Result<()> {
    let actor = ctx.actor()?;
    let manifest = Manifest::load(file)?;
    let report = manifest.apply(&ctx.store, &ctx.codec()?, actor).await?;
    ctx.save()?;

    for svc in &report.services {
        let verb = if svc.created { "created" } else { "updated" };
        ctx.output
            .progress(&format!("  → {}/{} {verb} ({})", manifest.project, svc.slug, svc.id));
    }
    ctx.output.success(&format!(
        "Applied {} service(s) to project {}",
        report.services.len(),
        manifest.project
    ));
    Ok(())
}

pub async fn reconcile(ctx: &Context) -> Result<()> {
    let report = ctx.orchestrator()?.reconcile().await?;
    ctx.save()?;

    if report.is_empty() {
        ctx.output.success("Nothing to reconcile");
    } else {
        ctx.output.success(&format!(
            "Marked {} deployment(s) interrupted, repaired {} service(s)",
            report.interrupted.len(),
            report.repaired.len()
        ));
    }
    Ok(())
}

pub fn secret(codec: &SecretCodec, action: SecretAction, output: &Output) -> Result<()> {
    let value = match action {
        SecretAction::Encrypt { value } => codec.encrypt_string(&value)?,
        SecretAction::Decrypt { value } => codec.decrypt_string(&value)?,
    };
    output.success(&value);
    Ok(())
}
