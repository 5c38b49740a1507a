//! Checkpoint command - Inspect and move the per-scope pass checkpoints

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use woosync_core::domain::{Checkpoint, SyncScope};
use woosync_core::ports::ISyncStateRepository;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum CheckpointCommand {
    /// Show the checkpoint each pass will start from
    Show,
    /// Move a scope's checkpoint (the next pass starts there)
    Set {
        /// items, sales_orders or stock
        scope: SyncScope,
        /// RFC 3339 instant, e.g. 2024-05-01T00:00:00Z
        at: Checkpoint,
    },
}

impl CheckpointCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let config = ctx.load_config()?;
        let state: Arc<dyn ISyncStateRepository> = ctx.open_store(&config).await?;
        let formatter = ctx.formatter();

        match self {
            CheckpointCommand::Show => {
                let initial = config.integration.initial_checkpoint.map(Checkpoint::at);
                let mut rows = Vec::new();
                for scope in SyncScope::ALL {
                    let stored = state
                        .get_checkpoint(scope)
                        .await
                        .with_context(|| format!("Failed to read the {} checkpoint", scope))?;
                    rows.push((scope, stored));
                }

                if ctx.format.is_json() {
                    let json: serde_json::Map<String, serde_json::Value> = rows
                        .iter()
                        .map(|(scope, stored)| {
                            (
                                scope.to_string(),
                                serde_json::json!({
                                    "stored": stored,
                                    "effective": stored.or(initial),
                                }),
                            )
                        })
                        .collect();
                    formatter.print_json(&serde_json::Value::Object(json));
                    return Ok(());
                }

                formatter.success("Checkpoints");
                for (scope, stored) in rows {
                    let line = match (stored, initial) {
                        (Some(cp), _) => cp.to_string(),
                        (None, Some(cp)) => format!("{} (integration.initial_checkpoint)", cp),
                        (None, None) => "not set".to_string(),
                    };
                    formatter.info(&format!("{:<14} {}", scope, line));
                }
                Ok(())
            }
            CheckpointCommand::Set { scope, at } => {
                state
                    .save_checkpoint(*scope, *at)
                    .await
                    .with_context(|| format!("Failed to save the {} checkpoint", scope))?;
                info!(%scope, checkpoint = %at, "Checkpoint moved");

                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "scope": scope.to_string(),
                        "checkpoint": at,
                    }));
                } else {
                    formatter.success(&format!("{} checkpoint set to {}", scope, at));
                }
                Ok(())
            }
        }
    }
}
