//! Single-record commands
//!
//! These bypass the pass locks and the checkpoints: they sync exactly the
//! record named on the command line, whatever its modification time.

use anyhow::{Context, Result};
use clap::Args;

use woosync_core::domain::{ItemCode, RecordName, RemoteId, ServerId};
use woosync_sync::{PushOutcome, RecordOutcome};

use super::{print_report, CliContext};

fn describe(outcome: RecordOutcome) -> &'static str {
    match outcome {
        RecordOutcome::CreatedLocal => "created in the ERP",
        RecordOutcome::UpdatedLocal => "updated in the ERP",
        RecordOutcome::CreatedRemote => "created in WooCommerce",
        RecordOutcome::UpdatedRemote => "updated in WooCommerce",
        RecordOutcome::Skipped => "already in sync",
    }
}

/// Accepts either a bare server id or the server URL
fn parse_server(raw: &str) -> Result<ServerId> {
    if raw.contains("://") {
        ServerId::from_url(raw).with_context(|| format!("Invalid server URL: '{}'", raw))
    } else {
        raw.parse()
            .with_context(|| format!("Invalid server id: '{}'", raw))
    }
}

// ============================================================================
// sync-item
// ============================================================================

#[derive(Debug, Args)]
pub struct SyncItemCommand {
    /// ERP item code
    pub item_code: String,
}

impl SyncItemCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let code = ItemCode::new(self.item_code.clone())?;

        let orchestrator = ctx.orchestrator().await?;
        let report = orchestrator.sync_single_item(&code).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "item_code": code.as_str(),
                "report": report,
            }));
        } else {
            print_report(formatter.as_ref(), &format!("Item {}", code), &report);
        }
        if report.failed > 0 {
            anyhow::bail!("Item {} failed on {} server(s)", code, report.failed);
        }
        Ok(())
    }
}

// ============================================================================
// sync-order
// ============================================================================

#[derive(Debug, Args)]
pub struct SyncOrderCommand {
    /// ERP sales order name
    pub name: String,
}

impl SyncOrderCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let name = RecordName::new(self.name.clone())?;

        let orchestrator = ctx.orchestrator().await?;
        let outcome = orchestrator.sync_single_order(&name).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "sales_order": name.as_str(),
                "outcome": outcome,
            }));
        } else {
            formatter.success(&format!("Sales order {}: {}", name, describe(outcome)));
        }
        Ok(())
    }
}

// ============================================================================
// sync-remote-order
// ============================================================================

#[derive(Debug, Args)]
pub struct SyncRemoteOrderCommand {
    /// Server id (shop domain) or URL
    pub server: String,

    /// WooCommerce order id
    pub order_id: String,
}

impl SyncRemoteOrderCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let server = parse_server(&self.server)?;
        let remote_id: RemoteId = self
            .order_id
            .parse()
            .with_context(|| format!("Invalid order id: '{}'", self.order_id))?;

        let orchestrator = ctx.orchestrator().await?;
        let outcome = orchestrator
            .sync_single_remote_order(&server, &remote_id)
            .await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "server": server.as_str(),
                "order_id": remote_id.as_str(),
                "outcome": outcome,
            }));
        } else {
            formatter.success(&format!(
                "Order {} of {}: {}",
                remote_id,
                server,
                describe(outcome)
            ));
        }
        Ok(())
    }
}

// ============================================================================
// push-status
// ============================================================================

#[derive(Debug, Args)]
pub struct PushStatusCommand {
    /// ERP sales order name
    pub name: String,
}

impl PushStatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let name = RecordName::new(self.name.clone())?;

        let orchestrator = ctx.orchestrator().await?;
        let outcome = orchestrator.push_order_status(&name).await?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "sales_order": name.as_str(),
                "outcome": outcome,
            }));
            return Ok(());
        }

        match &outcome {
            PushOutcome::Pushed { remote_status } => {
                formatter.success(&format!("{} is now '{}' in WooCommerce", name, remote_status))
            }
            PushOutcome::Disabled => {
                formatter.warn("Order status sync is disabled for this server")
            }
            PushOutcome::NotLinked => {
                formatter.warn(&format!("{} is not linked to a WooCommerce order", name))
            }
            PushOutcome::Unmapped { local_status } => formatter.warn(&format!(
                "No WooCommerce status is mapped to '{}' (see so_status_map)",
                local_status
            )),
            PushOutcome::Failed { message } => {
                formatter.error(&format!("Status push failed: {}", message))
            }
        }
        if matches!(outcome, PushOutcome::Failed { .. }) {
            anyhow::bail!("Status push for {} failed", name);
        }
        Ok(())
    }
}
