//! WooSync Daemon - Background synchronisation service
//!
//! This binary runs as a systemd user service and handles:
//! - Item, sales order and stock passes on a fixed interval
//! - The WooCommerce `order.created` webhook receiver
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon builds one [`SyncOrchestrator`] shared by the
//! [`SyncScheduler`] and the webhook receiver. Both run until a
//! `CancellationToken` is triggered by SIGTERM or SIGINT. Passes of the
//! same scope are serialised by the pass lock in the database, so a manual
//! `woosync sync` never overlaps a scheduled one.
//!
//! The configuration file is `$XDG_CONFIG_HOME/woosync/config.yaml`, or the
//! path in `WOOSYNC_CONFIG`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use woosync_core::config::Config;
use woosync_core::domain::SyncScope;
use woosync_core::ports::{ILocalStore, ISyncStateRepository};
use woosync_store::{DatabasePool, SqliteStore};
use woosync_sync::{PassRunner, SyncOrchestrator, SyncScheduler, WebhookHandler};

mod server;

use server::WebhookServer;

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration, the orchestrator and the shutdown token
struct DaemonService {
    config: Config,
    orchestrator: Arc<SyncOrchestrator>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Validates the configuration, opens the database and builds the REST
    /// clients
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            for e in &errors {
                error!(field = %e.field, message = %e.message, "Invalid configuration");
            }
            anyhow::bail!("Configuration has {} error(s)", errors.len());
        }

        let db_path = &config.store.database_path;
        let pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let store = Arc::new(SqliteStore::new(pool.pool().clone()));
        info!(path = %db_path.display(), "Opened database");

        let remotes = woosync_api::providers_for(&config);
        if config.enabled_servers().next().is_none() {
            warn!("No server has sync enabled; passes will do nothing");
        }

        let orchestrator = SyncOrchestrator::new(
            config.clone(),
            Arc::clone(&store) as Arc<dyn ILocalStore>,
            store as Arc<dyn ISyncStateRepository>,
            remotes,
        );

        Ok(Self {
            config,
            orchestrator: Arc::new(orchestrator),
            shutdown,
        })
    }

    /// Runs the scheduler and the webhook receiver until shutdown
    async fn run(&self) -> Result<()> {
        let scheduler = SyncScheduler::new(
            Duration::from_secs(self.config.daemon.interval_secs),
            SyncScope::ALL.to_vec(),
            self.shutdown.clone(),
        );
        let runner: Arc<dyn PassRunner> = Arc::clone(&self.orchestrator) as Arc<dyn PassRunner>;

        if !self.config.daemon.webhook_enabled {
            info!("Webhook receiver disabled");
            scheduler.run(runner).await;
            return Ok(());
        }

        for server in &self.config.servers {
            if server.enable_sync && server.secret.as_deref().unwrap_or("").is_empty() {
                warn!(
                    url = %server.url,
                    "No webhook secret configured; deliveries from this server will be refused"
                );
            }
        }

        let webhook = WebhookServer::new(
            WebhookHandler::new(Arc::clone(&self.orchestrator)),
            &self.config.daemon.webhook_bind,
        )?;

        let (_, served) = tokio::join!(scheduler.run(runner), async {
            let result = webhook.run(self.shutdown.clone()).await;
            if result.is_err() {
                // Stop the scheduler as well so the process exits
                self.shutdown.cancel();
            }
            result
        });

        served.context("Webhook receiver failed")
    }
}

// ============================================================================
// Startup
// ============================================================================

fn config_path() -> PathBuf {
    std::env::var_os("WOOSYNC_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        Ok(Config::default())
    }
}

/// `RUST_LOG` wins over `logging.level`; `logging.format: json` for
/// journald/ELK ingestion
fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path();
    let config = load_config(&path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))?;
    init_tracing(&config);

    info!(config_path = %path.display(), "WooSync daemon starting (woosyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;

    let result = service.run().await;

    match &result {
        Ok(()) => info!("WooSync daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "WooSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use woosync_core::config::ConfigBuilder;

    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> Config {
        ConfigBuilder::new()
            .database_path(dir.path().join("woosync.db"))
            .webhook_bind("127.0.0.1:0")
            .daemon_interval_secs(3600)
            .build()
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/woosync/config.yaml")).unwrap();
        assert_eq!(config.daemon.interval_secs, 3600);
        assert!(config.daemon.webhook_enabled);
    }

    #[tokio::test]
    async fn invalid_config_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.daemon.interval_secs = 0;

        let err = DaemonService::new(config, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Configuration has 1 error"));
    }

    #[tokio::test]
    async fn cancelled_daemon_stops() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let service = DaemonService::new(config_in(&dir), token.clone())
            .await
            .unwrap();

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), service.run())
            .await
            .expect("daemon did not stop")
            .unwrap();
    }
}
