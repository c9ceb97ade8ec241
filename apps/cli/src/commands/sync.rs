//! # Sync Commands
//!
//! One-shot and periodic queue draining, plus queue inspection.

use std::sync::Arc;
use tracing::info;

use scanlot_core::{QueueStats, SyncQueueItem};
use scanlot_sync::{SyncCoordinator, SyncReport};

use crate::error::{CliError, CliResult};
use crate::state::AppContext;

fn coordinator(ctx: &AppContext) -> SyncCoordinator {
    SyncCoordinator::for_gateway(&ctx.gateway, ctx.config.sync.clone())
}

/// Runs one sync pass.
pub async fn run_once(ctx: &AppContext) -> CliResult<SyncReport> {
    Ok(coordinator(ctx).perform_sync().await?)
}

/// Runs periodic passes until Ctrl-C, then waits for the running pass.
pub async fn watch(ctx: &AppContext) -> CliResult<Option<SyncReport>> {
    if !ctx.config.sync.enabled {
        return Err(CliError::Config(
            "periodic sync is disabled (sync.enabled = false)".into(),
        ));
    }

    let coordinator = Arc::new(coordinator(ctx));
    let handle = coordinator.start_periodic(ctx.config.sync.interval());
    info!(
        interval_secs = ctx.config.sync.interval_secs,
        "Watching sync queue, Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::Usage(e.to_string()))?;
    handle.stop().await?;

    Ok(coordinator.last_report().await)
}

pub async fn queue_stats(ctx: &AppContext) -> CliResult<QueueStats> {
    Ok(ctx.gateway.local().sync_queue().stats().await?)
}

pub async fn queue_list(ctx: &AppContext) -> CliResult<Vec<SyncQueueItem>> {
    Ok(ctx.gateway.local().sync_queue().list().await?)
}

/// Drops every queued write. Returns how many were removed.
pub async fn queue_clear(ctx: &AppContext) -> CliResult<usize> {
    Ok(ctx.gateway.local().sync_queue().clear().await?)
}
