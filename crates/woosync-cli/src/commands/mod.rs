//! CLI subcommands
//!
//! Every command receives a [`CliContext`] carrying the output format and
//! the configuration path, and builds whatever it needs from there.

pub mod checkpoint;
pub mod completions;
pub mod config;
pub mod errors;
pub mod inspect;
pub mod record;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use woosync_core::config::Config;
use woosync_core::ports::{ILocalStore, ISyncStateRepository};
use woosync_store::{DatabasePool, SqliteStore};
use woosync_sync::{SyncOrchestrator, SyncReport};

use crate::output::{self, OutputFormat, OutputFormatter};

/// Shared state handed to every command
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
}

impl CliContext {
    pub fn new(format: OutputFormat, config_path: PathBuf) -> Self {
        Self {
            format,
            config_path,
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        self.format.formatter()
    }

    /// Load the configuration file, or defaults when there is none
    pub fn load_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            info!(path = %self.config_path.display(), "No configuration file, using defaults");
            return Ok(Config::default());
        }
        Config::load(&self.config_path)
    }

    /// Load the configuration and refuse to go on if it does not validate
    pub fn load_valid_config(&self) -> Result<Config> {
        let config = self.load_config()?;
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| format!("{}: {}", e.field, e.message))
                .collect();
            anyhow::bail!(
                "Invalid configuration ({}):\n  {}",
                self.config_path.display(),
                messages.join("\n  ")
            );
        }
        Ok(config)
    }

    /// Open the SQLite database named by `store.database_path`
    pub async fn open_store(&self, config: &Config) -> Result<Arc<SqliteStore>> {
        let pool = DatabasePool::new(&config.store.database_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to open database {}",
                    config.store.database_path.display()
                )
            })?;
        Ok(Arc::new(SqliteStore::new(pool.pool().clone())))
    }

    /// Orchestrator with one REST client per configured server
    pub async fn orchestrator(&self) -> Result<SyncOrchestrator> {
        let config = self.load_valid_config()?;
        let store = self.open_store(&config).await?;
        let remotes = woosync_api::providers_for(&config);
        Ok(SyncOrchestrator::new(
            config,
            Arc::clone(&store) as Arc<dyn ILocalStore>,
            store as Arc<dyn ISyncStateRepository>,
            remotes,
        ))
    }
}

/// Human summary of a pass or single-record report
pub fn print_report(formatter: &dyn OutputFormatter, title: &str, report: &SyncReport) {
    if report.writes() == 0 && report.failed == 0 {
        formatter.success(&format!(
            "{}: already up to date ({})",
            title,
            output::duration(report.duration_ms)
        ));
    } else {
        formatter.success(&format!(
            "{} finished in {}",
            title,
            output::duration(report.duration_ms)
        ));
    }

    for (label, n) in [
        ("Created in ERP:      ", report.created_local),
        ("Updated in ERP:      ", report.updated_local),
        ("Created in WooCommerce:", report.created_remote),
        ("Updated in WooCommerce:", report.updated_remote),
        ("Unchanged:           ", report.skipped),
    ] {
        if n > 0 {
            formatter.info(&format!("{} {}", label, n));
        }
    }

    if report.failed > 0 {
        formatter.error(&format!(
            "{} failed (see `woosync errors`):",
            output::count(report.failed, "record")
        ));
        for err in &report.errors {
            formatter.info(&format!("  - {}", err));
        }
    }
}
