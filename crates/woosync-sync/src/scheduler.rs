//! Sync scheduler - runs batch passes on an interval
//!
//! The [`SyncScheduler`] drives a [`PassRunner`] (normally the
//! [`SyncOrchestrator`]) through every configured scope each time its
//! interval elapses. [`request_sync()`](SyncScheduler::request_sync) starts
//! a cycle without waiting for the next tick.
//!
//! ## Flow
//!
//! ```text
//! interval tick ──┐
//!                 ├──→ SyncScheduler ──→ run_scope(items) ──→ run_scope(orders) ──→ ...
//! request_sync ───┘          │
//!                     CancellationToken
//! ```
//!
//! A pass that finds its scope locked is skipped for that cycle. Passes
//! already started when the token is cancelled are allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use woosync_core::domain::SyncScope;

use crate::engine::{PassOutcome, SyncOrchestrator};
use crate::SyncError;

/// Something that can run one batch pass of a scope
#[async_trait::async_trait]
pub trait PassRunner: Send + Sync {
    async fn run_scope(&self, scope: SyncScope) -> Result<PassOutcome, SyncError>;
}

#[async_trait::async_trait]
impl PassRunner for SyncOrchestrator {
    async fn run_scope(&self, scope: SyncScope) -> Result<PassOutcome, SyncError> {
        SyncOrchestrator::run_scope(self, scope).await
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Runs the configured scopes on a fixed interval until cancelled
pub struct SyncScheduler {
    interval: Duration,
    scopes: Vec<SyncScope>,
    cancel: CancellationToken,
    requested: Notify,
}

impl SyncScheduler {
    /// Creates a scheduler that runs `scopes` in order every `interval`
    pub fn new(interval: Duration, scopes: Vec<SyncScope>, cancel: CancellationToken) -> Self {
        info!(
            interval_secs = interval.as_secs(),
            scopes = ?scopes,
            "Creating sync scheduler"
        );
        Self {
            interval,
            scopes,
            cancel,
            requested: Notify::new(),
        }
    }

    /// Start a cycle now instead of at the next tick
    ///
    /// Requests made while a cycle is running start one more cycle after it.
    pub fn request_sync(&self) {
        info!("Sync requested");
        self.requested.notify_one();
    }

    /// Main loop: the first cycle runs immediately
    pub async fn run(&self, runner: Arc<dyn PassRunner>) {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = self.requested.notified() => debug!("Running requested cycle"),
                _ = ticker.tick() => debug!("Running scheduled cycle"),
            }
            self.run_cycle(runner.as_ref()).await;
        }

        info!("Sync scheduler stopped");
    }

    /// Run every scope once; returns the number of passes that completed
    pub async fn run_cycle(&self, runner: &dyn PassRunner) -> usize {
        let mut completed = 0;
        for &scope in &self.scopes {
            if self.cancel.is_cancelled() {
                break;
            }
            match runner.run_scope(scope).await {
                Ok(outcome) => {
                    completed += 1;
                    debug!(%scope, writes = outcome.report.writes(), "Pass finished");
                }
                Err(SyncError::PassInProgress(_)) => {
                    info!(%scope, "Previous pass still running, skipping this cycle");
                }
                Err(e @ SyncError::MissingCheckpoint(_)) => {
                    warn!(%scope, error = %e, "Pass not started");
                }
                Err(e) => {
                    error!(%scope, error = %e, "Pass failed");
                }
            }
        }
        completed
    }
}

// ============================================================================
// Unit tests
// ============================================================================
