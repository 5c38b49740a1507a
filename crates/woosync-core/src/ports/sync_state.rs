//! Sync-state repository port (driven/secondary port)
//!
//! Holds the only state shared between passes: one checkpoint and one pass
//! lock per scope, plus the error log.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Checkpoint, ErrorLogEntry, ErrorLogId, RunId, SyncScope};

/// Port trait for checkpoints, pass locks and the error log
#[async_trait::async_trait]
pub trait ISyncStateRepository: Send + Sync {
    /// Current checkpoint of a scope, if one was ever saved
    async fn get_checkpoint(&self, scope: SyncScope) -> anyhow::Result<Option<Checkpoint>>;

    /// Persist the checkpoint of a scope
    async fn save_checkpoint(&self, scope: SyncScope, checkpoint: Checkpoint)
        -> anyhow::Result<()>;

    /// Take the pass lock of a scope
    ///
    /// Returns `false` when another owner holds a lock younger than
    /// `stale_after`. Older locks are taken over.
    async fn try_acquire_pass_lock(
        &self,
        scope: SyncScope,
        owner: RunId,
        stale_after: Duration,
    ) -> anyhow::Result<bool>;

    /// Re-stamp a held pass lock so it does not go stale mid-pass
    ///
    /// Returns `false` when `owner` no longer holds the lock.
    async fn refresh_pass_lock(&self, scope: SyncScope, owner: RunId) -> anyhow::Result<bool>;

    /// Release the pass lock if `owner` still holds it
    async fn release_pass_lock(&self, scope: SyncScope, owner: RunId) -> anyhow::Result<()>;

    /// Append an error log entry; returns its id
    async fn save_error_log(&self, entry: &ErrorLogEntry) -> anyhow::Result<ErrorLogId>;

    /// Entries since a timestamp, newest first, up to `limit`
    async fn get_error_logs_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<ErrorLogEntry>>;
}
