//! Sync command - Run synchronisation passes
//!
//! `woosync sync <scope>` runs one pass (or all of them in order) the same
//! way the daemon does: under the scope's pass lock, starting from the stored
//! checkpoint and saving the new one when the pass completes.
//!
//! With `--since` the pass starts from the given instant instead and the
//! stored checkpoint is left untouched.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use woosync_core::domain::{Checkpoint, SyncScope};
use woosync_sync::{PassOutcome, SyncError, SyncOrchestrator};

use super::{print_report, CliContext};
use crate::output::OutputFormatter;

/// Which pass to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Items,
    Orders,
    Stock,
    All,
}

impl ScopeArg {
    fn scopes(self) -> &'static [SyncScope] {
        match self {
            ScopeArg::Items => &[SyncScope::Items],
            ScopeArg::Orders => &[SyncScope::SalesOrders],
            ScopeArg::Stock => &[SyncScope::Stock],
            ScopeArg::All => &SyncScope::ALL,
        }
    }
}

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Pass to run
    #[arg(value_enum)]
    pub scope: ScopeArg,

    /// Start from this RFC 3339 instant instead of the stored checkpoint
    #[arg(long)]
    pub since: Option<String>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let since = self
            .since
            .as_deref()
            .map(|s| {
                s.parse::<Checkpoint>()
                    .with_context(|| format!("Invalid --since value: '{}'", s))
            })
            .transpose()?;

        let orchestrator = ctx.orchestrator().await?;

        let mut outcomes = Vec::new();
        let mut failures = Vec::new();
        for &scope in self.scopes() {
            info!(%scope, "Starting pass");
            match run(&orchestrator, scope, since).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => failures.push((scope, e)),
            }
        }

        if ctx.format.is_json() {
            let json = serde_json::json!({
                "passes": outcomes,
                "failures": failures
                    .iter()
                    .map(|(scope, e)| serde_json::json!({
                        "scope": scope.to_string(),
                        "error": e.to_string(),
                    }))
                    .collect::<Vec<_>>(),
            });
            formatter.print_json(&json);
        } else {
            for outcome in &outcomes {
                print_outcome(formatter.as_ref(), outcome);
            }
            for (scope, e) in &failures {
                formatter.error(&format!("{} pass did not run to completion: {}", scope, e));
            }
        }

        if !failures.is_empty() {
            anyhow::bail!("{} of {} passes failed", failures.len(), self.scopes().len());
        }
        Ok(())
    }

    fn scopes(&self) -> &'static [SyncScope] {
        self.scope.scopes()
    }
}

async fn run(
    orchestrator: &SyncOrchestrator,
    scope: SyncScope,
    since: Option<Checkpoint>,
) -> Result<PassOutcome, SyncError> {
    match (scope, since) {
        (SyncScope::Items, Some(checkpoint)) => orchestrator.run_items_sync(checkpoint).await,
        (SyncScope::SalesOrders, Some(checkpoint)) => {
            orchestrator.run_sales_orders_sync(checkpoint).await
        }
        _ => orchestrator.run_scope(scope).await,
    }
}

fn print_outcome(formatter: &dyn OutputFormatter, outcome: &PassOutcome) {
    print_report(formatter, &format!("{} pass", outcome.scope), &outcome.report);
    formatter.info(&format!("Checkpoint:          {}", outcome.checkpoint));
}
