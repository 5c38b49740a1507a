//! SQLite implementation of ISyncStateRepository
//!
//! The pass lock is a single upsert guarded by a `WHERE` clause: the row is
//! written only when the scope is free, already held by the same owner, or
//! held by a lock older than the staleness limit. A zero row count means
//! someone else holds it.

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;

use woosync_core::domain::{Checkpoint, ErrorLogEntry, ErrorLogId, RunId, SyncScope};
use woosync_core::ports::ISyncStateRepository;

use crate::repository::SqliteStore;
use crate::rows::{encode_datetime, error_log_from_row, parse_datetime, stamp_now};

#[async_trait::async_trait]
impl ISyncStateRepository for SqliteStore {
    async fn get_checkpoint(&self, scope: SyncScope) -> anyhow::Result<Option<Checkpoint>> {
        let row = sqlx::query("SELECT instant FROM checkpoints WHERE scope = ?")
            .bind(scope.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let instant: String = r.get("instant");
                Ok(Some(Checkpoint::at(parse_datetime(&instant)?)))
            }
            None => Ok(None),
        }
    }

    async fn save_checkpoint(
        &self,
        scope: SyncScope,
        checkpoint: Checkpoint,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO checkpoints (scope, instant) VALUES (?, ?)")
            .bind(scope.as_str())
            .bind(encode_datetime(&checkpoint.instant()))
            .execute(&self.pool)
            .await?;

        tracing::debug!(scope = %scope, checkpoint = %checkpoint, "Saved checkpoint");
        Ok(())
    }

    async fn try_acquire_pass_lock(
        &self,
        scope: SyncScope,
        owner: RunId,
        stale_after: Duration,
    ) -> anyhow::Result<bool> {
        let now = stamp_now();
        let stale_before = now - stale_after;

        let result = sqlx::query(
            "INSERT INTO pass_locks (scope, owner, acquired_at) VALUES (?, ?, ?) \
             ON CONFLICT(scope) DO UPDATE SET \
              owner = excluded.owner, acquired_at = excluded.acquired_at \
             WHERE pass_locks.owner = excluded.owner OR pass_locks.acquired_at < ?",
        )
        .bind(scope.as_str())
        .bind(owner.to_string())
        .bind(encode_datetime(&now))
        .bind(encode_datetime(&stale_before))
        .execute(&self.pool)
        .await?;

        let acquired = result.rows_affected() > 0;
        if acquired {
            tracing::debug!(scope = %scope, run_id = %owner, "Pass lock acquired");
        } else {
            tracing::debug!(scope = %scope, run_id = %owner, "Pass lock held by another run");
        }
        Ok(acquired)
    }

    async fn refresh_pass_lock(&self, scope: SyncScope, owner: RunId) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE pass_locks SET acquired_at = ? WHERE scope = ? AND owner = ?")
            .bind(encode_datetime(&stamp_now()))
            .bind(scope.as_str())
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;

        let held = result.rows_affected() > 0;
        tracing::trace!(scope = %scope, run_id = %owner, held, "Pass lock refreshed");
        Ok(held)
    }

    async fn release_pass_lock(&self, scope: SyncScope, owner: RunId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pass_locks WHERE scope = ? AND owner = ?")
            .bind(scope.as_str())
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;

        tracing::debug!(scope = %scope, run_id = %owner, "Pass lock released");
        Ok(())
    }

    async fn save_error_log(&self, entry: &ErrorLogEntry) -> anyhow::Result<ErrorLogId> {
        let details = serde_json::to_string(entry.details())
            .map_err(|e| anyhow::anyhow!("Failed to serialize error details: {}", e))?;

        let result = sqlx::query(
            "INSERT INTO error_log \
             (timestamp, run_id, scope, kind, record, server, message, details) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(encode_datetime(&entry.timestamp()))
        .bind(entry.run_id().map(ToString::to_string))
        .bind(entry.scope().map(|s| s.as_str()))
        .bind(entry.kind().as_str())
        .bind(entry.record())
        .bind(entry.server().map(|s| s.as_str()))
        .bind(entry.message())
        .bind(&details)
        .execute(&self.pool)
        .await?;

        let id = ErrorLogId::new(result.last_insert_rowid());
        tracing::trace!(id = %id, kind = %entry.kind(), "Saved error log entry");
        Ok(id)
    }

    async fn get_error_logs_since(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> anyhow::Result<Vec<ErrorLogEntry>> {
        let rows = sqlx::query(
            "SELECT * FROM error_log WHERE timestamp >= ? ORDER BY timestamp DESC, id DESC LIMIT ?",
        )
        .bind(encode_datetime(&since))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push(error_log_from_row(row)?);
        }
        Ok(entries)
    }
}
