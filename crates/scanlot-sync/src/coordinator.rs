//! # Sync Coordinator
//!
//! Replays the local sync queue against the remote store.
//!
//! ## Pass Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncCoordinator                                  │
//! │                                                                         │
//! │   Idle ──► Checking ──┬── unreachable ──► Idle   {0, 0, N}              │
//! │                       │                                                 │
//! │                       └── reachable ──► Syncing                         │
//! │                                           │                             │
//! │              for item in queue (oldest first):                         │
//! │                ok    → mark_synced (removed)                            │
//! │                error → mark_failed (kept, retry_count += 1)             │
//! │                over max_retries → skipped (kept)                        │
//! │                                           │                             │
//! │                    ┌──────────────────────┼──────────────────┐          │
//! │                    ▼                      ▼                  ▼          │
//! │                 Success           PartialFailure          Failure       │
//! │                    └──────────────────────┴──────────────────┴──► Idle  │
//! │                                                                         │
//! │  SINGLE FLIGHT: a perform_sync() issued while a pass is running waits  │
//! │  for that pass and receives its report. No second pass is started.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Periodic Trigger
//! [`SyncCoordinator::start_periodic`] spawns a task that runs a pass per
//! interval tick. Stopping it cancels future ticks only; a pass already
//! running completes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use scanlot_db::LocalStore;

use crate::config::SyncSettings;
use crate::error::{SyncError, SyncResult};
use crate::gateway::PersistenceGateway;
use crate::remote::{self, RemoteStore};

// =============================================================================
// State & Report
// =============================================================================

/// Coordinator state, observable through [`SyncCoordinator::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Checking,
    Syncing,
    Success,
    PartialFailure,
    Failure,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncState::Idle => "idle",
            SyncState::Checking => "checking",
            SyncState::Syncing => "syncing",
            SyncState::Success => "success",
            SyncState::PartialFailure => "partial_failure",
            SyncState::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// One queued write that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    /// Queue sequence id.
    pub id: u64,
    pub table: String,
    /// Attempts so far, including this one.
    pub retry_count: u32,
    pub error: String,
}

/// Summary of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub synced: usize,
    pub failed: usize,
    /// Queue length after the pass.
    pub remaining: usize,
    /// Items left alone because they exceeded `max_retries`.
    pub skipped: usize,
    /// False when the remote was unreachable and nothing was attempted.
    pub online: bool,
    pub failures: Vec<ItemFailure>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn offline(remaining: usize) -> Self {
        SyncReport {
            synced: 0,
            failed: 0,
            remaining,
            skipped: 0,
            online: false,
            failures: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// Outcome state of an online pass.
    pub fn state(&self) -> SyncState {
        match (self.synced, self.failed) {
            (_, 0) => SyncState::Success,
            (0, _) => SyncState::Failure,
            _ => SyncState::PartialFailure,
        }
    }

    /// Converts itemized failures into [`SyncError::PartialFailure`].
    pub fn into_result(self) -> SyncResult<SyncReport> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(SyncError::PartialFailure(self.failures))
        }
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives coordinator events (status bar, CLI progress, ...).
pub trait SyncEventEmitter: Send + Sync {
    /// Called on every state transition.
    fn emit_state(&self, state: SyncState);

    /// Called once per finished pass.
    fn emit_report(&self, report: &SyncReport);

    /// Called when a pass fails outright.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: SyncState) {}
    fn emit_report(&self, _report: &SyncReport) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Single Flight
// =============================================================================

type PassOutcome = Result<SyncReport, String>;
type InFlight = Mutex<Option<broadcast::Sender<PassOutcome>>>;

enum Flight<'a> {
    Leader(broadcast::Sender<PassOutcome>, InFlightGuard<'a>),
    Follower(broadcast::Receiver<PassOutcome>),
}

/// Clears the in-flight slot when the leading pass ends or is dropped.
struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = None;
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Drains the sync queue into the remote store.
pub struct SyncCoordinator {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
    settings: SyncSettings,
    state: RwLock<SyncState>,
    last_report: RwLock<Option<SyncReport>>,
    emitter: Arc<dyn SyncEventEmitter>,
    in_flight: InFlight,
}

impl SyncCoordinator {
    pub fn new(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        settings: SyncSettings,
    ) -> Self {
        Self::with_emitter(local, remote, settings, Arc::new(NoOpEmitter))
    }

    /// Creates a coordinator with a custom event emitter.
    pub fn with_emitter(
        local: LocalStore,
        remote: Option<Arc<dyn RemoteStore>>,
        settings: SyncSettings,
        emitter: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncCoordinator {
            local,
            remote,
            settings,
            state: RwLock::new(SyncState::Idle),
            last_report: RwLock::new(None),
            emitter,
            in_flight: Mutex::new(None),
        }
    }

    /// Shares the gateway's local and remote stores.
    pub fn for_gateway(gateway: &PersistenceGateway, settings: SyncSettings) -> Self {
        Self::new(gateway.local().clone(), gateway.remote().cloned(), settings)
    }

    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Report of the most recent finished pass.
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Runs one pass, or joins the pass already running.
    ///
    /// ## Returns
    /// - `{synced: 0, failed: 0, remaining: N}` when the remote is
    ///   unreachable; nothing is mutated
    /// - the itemized report otherwise; failed items stay queued
    ///
    /// ## Errors
    /// - [`SyncError::RemoteNotConfigured`] when no remote store was given
    /// - local store errors while reading or updating the queue
    pub async fn perform_sync(&self) -> SyncResult<SyncReport> {
        let remote = match &self.remote {
            Some(remote) => remote.clone(),
            None => {
                self.emitter
                    .emit_error(&SyncError::RemoteNotConfigured.to_string(), false);
                return Err(SyncError::RemoteNotConfigured);
            }
        };

        match self.join_or_lead()? {
            Flight::Follower(mut rx) => {
                debug!("Sync already in flight, waiting for its report");
                match rx.recv().await {
                    Ok(Ok(report)) => Ok(report),
                    Ok(Err(message)) => Err(SyncError::Internal(message)),
                    Err(_) => Err(SyncError::Internal(
                        "in-flight sync ended without a report".into(),
                    )),
                }
            }
            Flight::Leader(tx, guard) => {
                let result = self.run_pass(remote.as_ref()).await;
                drop(guard);
                // Nobody waiting is fine
                let _ = tx.send(match &result {
                    Ok(report) => Ok(report.clone()),
                    Err(e) => Err(e.to_string()),
                });
                result
            }
        }
    }

    /// Spawns the periodic trigger. Dropping the handle also stops it.
    pub fn start_periodic(self: &Arc<Self>, interval: Duration) -> PeriodicSyncHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let coordinator = Arc::clone(self);
        // interval() rejects a zero period
        let period = interval.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            info!(interval_secs = period.as_secs(), "Periodic sync starting");
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match coordinator.perform_sync().await {
                            Ok(report) => debug!(
                                synced = report.synced,
                                remaining = report.remaining,
                                "Periodic sync pass done"
                            ),
                            Err(e) => error!(error = %e, "Periodic sync pass failed"),
                        }
                    }

                    _ = shutdown_rx.recv() => {
                        info!("Periodic sync shutting down");
                        break;
                    }
                }
            }

            info!("Periodic sync stopped");
        });

        PeriodicSyncHandle { shutdown_tx, task }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn join_or_lead(&self) -> SyncResult<Flight<'_>> {
        let mut slot = self
            .in_flight
            .lock()
            .map_err(|_| SyncError::Internal("in-flight lock poisoned".into()))?;

        if let Some(tx) = slot.as_ref() {
            return Ok(Flight::Follower(tx.subscribe()));
        }

        let (tx, _) = broadcast::channel(1);
        *slot = Some(tx.clone());
        Ok(Flight::Leader(tx, InFlightGuard(&self.in_flight)))
    }

    async fn run_pass(&self, remote: &dyn RemoteStore) -> SyncResult<SyncReport> {
        let result = self.drain(remote).await;

        match &result {
            Ok(report) => {
                if report.online {
                    self.set_state(report.state()).await;
                }
                *self.last_report.write().await = Some(report.clone());
                self.emitter.emit_report(report);
            }
            Err(e) => {
                self.set_state(SyncState::Failure).await;
                error!(error = %e, "Sync pass failed");
                self.emitter.emit_error(&e.to_string(), e.is_retryable());
            }
        }

        self.set_state(SyncState::Idle).await;
        result
    }

    async fn drain(&self, remote: &dyn RemoteStore) -> SyncResult<SyncReport> {
        self.set_state(SyncState::Checking).await;
        let queue = self.local.sync_queue();

        if !remote::is_reachable(remote).await {
            let remaining = queue.len().await?;
            info!(remaining, "Remote unreachable, sync skipped");
            return Ok(SyncReport::offline(remaining));
        }

        self.set_state(SyncState::Syncing).await;
        let items = queue.list().await?;
        info!(count = items.len(), "Starting sync pass");

        let mut report = SyncReport {
            online: true,
            ..SyncReport::offline(0)
        };

        for item in items {
            let max = self.settings.max_retries;
            if max > 0 && item.retry_count >= max {
                warn!(
                    id = item.id,
                    table = %item.payload.table,
                    retry_count = item.retry_count,
                    "Skipping entry that exceeded max retry attempts"
                );
                report.skipped += 1;
                continue;
            }

            match remote::apply(remote, &item.payload).await {
                Ok(()) => {
                    queue.mark_synced(item.id).await?;
                    report.synced += 1;
                }
                Err(e) => {
                    let failed = queue.mark_failed(item.id, &e.to_string()).await?;
                    report.failed += 1;
                    report.failures.push(ItemFailure {
                        id: failed.id,
                        table: failed.payload.table,
                        retry_count: failed.retry_count,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.remaining = queue.len().await?;
        report.finished_at = Utc::now();

        info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            remaining = report.remaining,
            "Sync pass complete"
        );
        Ok(report)
    }

    async fn set_state(&self, state: SyncState) {
        *self.state.write().await = state;
        debug!(%state, "Sync state");
        self.emitter.emit_state(state);
    }
}

// =============================================================================
// Periodic Handle
// =============================================================================

/// Controls a running periodic trigger.
pub struct PeriodicSyncHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl PeriodicSyncHandle {
    /// Cancels future ticks and waits for a running pass to finish.
    pub async fn stop(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        self.task
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
