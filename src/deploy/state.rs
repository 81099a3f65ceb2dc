// ABOUTME: Deployment attempt state markers for the type state pattern.
// ABOUTME: Zero-sized types enforce pending -> deploying -> finished at compile time.

/// Recorded and returned to the caller; waiting for a concurrency permit.
/// Available actions: `begin()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// Runtime work in progress.
/// Available actions: `succeed()`, `fail()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Deploying;

/// Success or failure recorded, `finished_at` stamped.
/// Available actions: `into_record()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Finished;
