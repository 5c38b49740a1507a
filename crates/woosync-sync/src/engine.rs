//! Sync pass orchestration
//!
//! The [`SyncOrchestrator`] runs batch passes over every enabled server and
//! offers single-record entry points for the CLI and the webhook receiver.
//!
//! ## Pass Flow
//!
//! 1. **Lock**: take the pass lock of the scope; a second pass of the same
//!    scope is refused with [`SyncError::PassInProgress`]. The lock is
//!    re-stamped while the pass runs; a pass whose lock was taken over stops
//!    with the same error
//! 2. **Remote changes**: list records modified since the checkpoint and
//!    reconcile each one
//! 3. **Local changes**: query local records modified since the checkpoint
//!    that were not handled in step 2 and reconcile them against the server
//! 4. **Checkpoint**: advance to the pass start time and release the lock
//!
//! Record-level failures are logged and counted; the pass goes on. Failures
//! that leave the pass incomplete (a listing that cannot be fetched, a store
//! that cannot be queried) abort it without advancing the checkpoint.
//!
//! ## Retry Logic
//!
//! Transient remote errors on listings are retried with exponential
//! backoff from `retry.base_delay_ms`, at most `retry.max_retries` times.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use woosync_audit::ErrorLogger;
use woosync_core::config::{Config, RetryConfig};
use woosync_core::domain::{
    Checkpoint, ItemCode, RecordName, RemoteEntity, RemoteId, RemoteRecord, RunId, ServerId,
    SalesOrder, SyncScope,
};
use woosync_core::ports::{
    ILocalStore, IRemoteApi, ISyncStateRepository, ItemFilter, RemoteApiError, SalesOrderFilter,
};
use woosync_reconcile::ReconcileError;

use crate::items::ItemSynchronizer;
use crate::orders::SalesOrderSynchronizer;
use crate::report::{RecordOutcome, SyncReport};
use crate::status::{OrderStatusSynchronizer, PushOutcome};
use crate::stock::StockSynchronizer;
use crate::target::SyncTarget;
use crate::SyncError;

// ============================================================================
// PassOutcome
// ============================================================================

/// Result of a completed batch pass
#[derive(Debug, Clone, Serialize)]
pub struct PassOutcome {
    pub scope: SyncScope,
    /// Checkpoint to hand to the next pass
    pub checkpoint: Checkpoint,
    pub report: SyncReport,
}

// ============================================================================
// Retry logic
// ============================================================================

/// Backoff settings for remote listings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.base_delay_ms))
    }
}

/// Executes a remote call, retrying transient errors with exponential backoff
async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, f: F) -> Result<T, RemoteApiError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RemoteApiError>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if attempt < policy.max_retries && err.is_transient() => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Log a failed record and count it
async fn record_failure(
    errors: &ErrorLogger,
    report: &mut SyncReport,
    server: &ServerId,
    record: &str,
    error: &SyncError,
) {
    errors.log_record_failure(Some(server), record, error).await;
    report.record_failure(record, error);
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Runs batch passes and single-record syncs against all configured servers
pub struct SyncOrchestrator {
    config: Config,
    store: Arc<dyn ILocalStore>,
    state: Arc<dyn ISyncStateRepository>,
    targets: Vec<SyncTarget>,
    errors: ErrorLogger,
    retry: RetryPolicy,
    lock_heartbeat: Duration,
}

impl SyncOrchestrator {
    /// Creates an orchestrator over one remote client per server
    ///
    /// Clients whose server has no configuration entry are ignored.
    pub fn new(
        config: Config,
        store: Arc<dyn ILocalStore>,
        state: Arc<dyn ISyncStateRepository>,
        remotes: Vec<Arc<dyn IRemoteApi>>,
    ) -> Self {
        let targets = remotes
            .into_iter()
            .filter_map(|remote| match config.server(remote.server()) {
                Some(server) => Some(SyncTarget::new(server.clone(), remote)),
                None => {
                    warn!(server = %remote.server(), "No configuration for remote client, ignoring");
                    None
                }
            })
            .collect();

        // Three refreshes per staleness window
        let lock_heartbeat = (Duration::from_secs(config.integration.pass_lock_stale_secs) / 3)
            .max(Duration::from_secs(1));

        Self {
            retry: RetryPolicy::from(&config.retry),
            lock_heartbeat,
            errors: ErrorLogger::new(Arc::clone(&state)),
            config,
            store,
            state,
            targets,
        }
    }

    /// Overrides the retry policy (tests use a zero delay)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides how often a running pass re-stamps its lock
    pub fn with_lock_heartbeat(mut self, every: Duration) -> Self {
        self.lock_heartbeat = every;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// All servers with a client, enabled or not
    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    fn target(&self, server: &ServerId) -> Result<&SyncTarget, SyncError> {
        self.targets
            .iter()
            .find(|t| &t.server == server)
            .ok_or_else(|| SyncError::UnknownServer(server.clone()))
    }

    fn enabled_target(&self, server: &ServerId) -> Result<&SyncTarget, SyncError> {
        let target = self.target(server)?;
        if !target.is_enabled() {
            return Err(SyncError::SyncDisabled(server.clone()));
        }
        Ok(target)
    }

    fn enabled_targets(&self) -> impl Iterator<Item = &SyncTarget> {
        self.targets.iter().filter(|t| t.is_enabled())
    }

    fn item_synchronizer(&self, errors: &ErrorLogger) -> Arc<ItemSynchronizer> {
        Arc::new(ItemSynchronizer::new(Arc::clone(&self.store), errors.clone()))
    }

    fn sales_order_synchronizer(&self, errors: &ErrorLogger) -> SalesOrderSynchronizer {
        SalesOrderSynchronizer::new(
            Arc::clone(&self.store),
            self.item_synchronizer(errors),
            errors.clone(),
        )
    }

    // ========================================================================
    // Checkpoints and locking
    // ========================================================================

    /// Stored checkpoint of a scope, else the configured initial one
    ///
    /// # Errors
    /// `MissingCheckpoint` when neither exists.
    pub async fn resolve_checkpoint(&self, scope: SyncScope) -> Result<Checkpoint, SyncError> {
        if let Some(checkpoint) = self.state.get_checkpoint(scope).await? {
            return Ok(checkpoint);
        }
        self.config
            .integration
            .initial_checkpoint
            .map(Checkpoint::at)
            .ok_or(SyncError::MissingCheckpoint(scope))
    }

    /// Run a pass of `scope` from the stored checkpoint and store the next one
    #[tracing::instrument(skip(self))]
    pub async fn run_scope(&self, scope: SyncScope) -> Result<PassOutcome, SyncError> {
        let outcome = match scope {
            SyncScope::Items => {
                let checkpoint = self.resolve_checkpoint(scope).await?;
                self.run_items_sync(checkpoint).await?
            }
            SyncScope::SalesOrders => {
                let checkpoint = self.resolve_checkpoint(scope).await?;
                self.run_sales_orders_sync(checkpoint).await?
            }
            SyncScope::Stock => self.run_stock_sync().await?,
        };
        self.state.save_checkpoint(scope, outcome.checkpoint).await?;
        Ok(outcome)
    }

    /// Run `pass` while holding the lock of `scope`
    async fn locked<F, Fut>(&self, scope: SyncScope, pass: F) -> Result<PassOutcome, SyncError>
    where
        F: FnOnce(ErrorLogger) -> Fut,
        Fut: Future<Output = Result<PassOutcome, SyncError>>,
    {
        let run_id = RunId::new();
        let stale_after = chrono::Duration::from_std(Duration::from_secs(
            self.config.integration.pass_lock_stale_secs,
        ))
        .unwrap_or_else(|_| chrono::Duration::hours(2));

        if !self
            .state
            .try_acquire_pass_lock(scope, run_id, stale_after)
            .await?
        {
            info!(%scope, "Pass already running, not starting another");
            return Err(SyncError::PassInProgress(scope));
        }

        info!(%scope, run_id = %run_id, "Starting sync pass");
        let errors = self.errors.for_pass(run_id, scope);
        let result = tokio::select! {
            biased;
            result = pass(errors.clone()) => result,
            _ = self.keep_pass_lock(scope, run_id) => Err(SyncError::PassInProgress(scope)),
        };

        if let Err(e) = self.state.release_pass_lock(scope, run_id).await {
            warn!(%scope, error = %e, "Failed to release pass lock");
        }

        match &result {
            Ok(outcome) => info!(
                %scope,
                created_local = outcome.report.created_local,
                updated_local = outcome.report.updated_local,
                created_remote = outcome.report.created_remote,
                updated_remote = outcome.report.updated_remote,
                skipped = outcome.report.skipped,
                failed = outcome.report.failed,
                duration_ms = outcome.report.duration_ms,
                checkpoint = %outcome.checkpoint,
                "Sync pass complete"
            ),
            Err(e) => {
                errors.log_pass_failure(None, e).await;
            }
        }
        result
    }

    /// Re-stamp the lock until it is lost; returns only when another run took it
    async fn keep_pass_lock(&self, scope: SyncScope, run_id: RunId) {
        let mut ticker = tokio::time::interval(self.lock_heartbeat);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.state.refresh_pass_lock(scope, run_id).await {
                Ok(true) => debug!(%scope, run_id = %run_id, "Pass lock refreshed"),
                Ok(false) => {
                    warn!(%scope, run_id = %run_id, "Pass lock taken over by another run, aborting pass");
                    return;
                }
                Err(e) => warn!(%scope, error = %e, "Failed to refresh pass lock"),
            }
        }
    }

    // ========================================================================
    // Item pass
    // ========================================================================

    /// Reconcile items changed on either side since `checkpoint`
    #[tracing::instrument(skip(self))]
    pub async fn run_items_sync(&self, checkpoint: Checkpoint) -> Result<PassOutcome, SyncError> {
        self.locked(SyncScope::Items, |errors| self.items_pass(errors, checkpoint))
            .await
    }

    async fn items_pass(&self, errors: ErrorLogger, checkpoint: Checkpoint) -> Result<PassOutcome, SyncError> {
        let started = Instant::now();
        let pass_start = Utc::now();
        let since = checkpoint.instant();
        let items = self.item_synchronizer(&errors);
        let mut report = SyncReport::default();

        for target in self.enabled_targets() {
            for error in target.mappings.errors() {
                let field = match error {
                    ReconcileError::InvalidExpression { local_field, .. } => local_field.as_str(),
                    _ => "item_field_map",
                };
                errors
                    .log_mapping_error(&target.server, field, &error.to_string())
                    .await;
            }

            let products = with_retry(&self.retry, "list_products", || {
                target.remote.fetch_modified_since(&RemoteEntity::Product, since)
            })
            .await?;
            info!(server = %target.server, count = products.len(), "Listed modified products");

            let mut seen: HashSet<ItemCode> = HashSet::new();
            for product in &products {
                self.sync_listed_item(target, &items, &errors, &mut report, &mut seen, product)
                    .await;

                if product.str_field("type") != Some("variable") {
                    continue;
                }
                let entity = RemoteEntity::Variation {
                    parent: product.id().clone(),
                };
                match with_retry(&self.retry, "list_variations", || {
                    target.remote.fetch_modified_since(&entity, since)
                })
                .await
                {
                    Ok(variations) => {
                        for variation in &variations {
                            self.sync_listed_item(target, &items, &errors, &mut report, &mut seen, variation)
                                .await;
                        }
                    }
                    Err(e) => {
                        record_failure(&errors, &mut report, &target.server, product.id().as_str(), &e.into())
                            .await;
                    }
                }
            }

            let filter = ItemFilter::new()
                .with_modified_since(since)
                .with_linked_to(target.server.clone());
            let mut changed = self.store.query_items(&filter).await?;
            changed.retain(|item| !seen.contains(&item.item_code));
            // Templates must exist remotely before their variants
            changed.sort_by_key(|item| item.kind.variant_of().is_some());
            debug!(server = %target.server, count = changed.len(), "Locally changed items");

            for item in changed {
                let code = item.item_code.clone();
                match items.sync_local(target, item).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => record_failure(&errors, &mut report, &target.server, code.as_str(), &e).await,
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(PassOutcome {
            scope: SyncScope::Items,
            checkpoint: checkpoint.advance_to(pass_start),
            report,
        })
    }

    async fn sync_listed_item(
        &self,
        target: &SyncTarget,
        items: &ItemSynchronizer,
        errors: &ErrorLogger,
        report: &mut SyncReport,
        seen: &mut HashSet<ItemCode>,
        record: &RemoteRecord,
    ) {
        match items.sync_remote(target, record).await {
            Ok((outcome, code)) => {
                report.record(outcome);
                seen.insert(code);
            }
            Err(e) => record_failure(errors, report, &target.server, record.id().as_str(), &e).await,
        }
    }

    // ========================================================================
    // Sales order pass
    // ========================================================================

    /// Reconcile orders changed on either side since `checkpoint`
    #[tracing::instrument(skip(self))]
    pub async fn run_sales_orders_sync(&self, checkpoint: Checkpoint) -> Result<PassOutcome, SyncError> {
        self.locked(SyncScope::SalesOrders, |errors| {
            self.sales_orders_pass(errors, checkpoint)
        })
        .await
    }

    async fn sales_orders_pass(
        &self,
        errors: ErrorLogger,
        checkpoint: Checkpoint,
    ) -> Result<PassOutcome, SyncError> {
        let started = Instant::now();
        let pass_start = Utc::now();
        let since = checkpoint.instant();
        let sales_orders = self.sales_order_synchronizer(&errors);
        let status = OrderStatusSynchronizer::new(errors.clone());
        let mut report = SyncReport::default();

        for target in self.enabled_targets() {
            let orders = with_retry(&self.retry, "list_orders", || {
                target.remote.fetch_modified_since(&RemoteEntity::Order, since)
            })
            .await?;
            info!(server = %target.server, count = orders.len(), "Listed modified orders");

            let mut seen: HashSet<RemoteId> = HashSet::new();
            for record in &orders {
                seen.insert(record.id().clone());
                match sales_orders.sync_remote(target, record).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => {
                        record_failure(&errors, &mut report, &target.server, record.id().as_str(), &e)
                            .await
                    }
                }
            }

            let filter = SalesOrderFilter::new()
                .with_modified_since(since)
                .with_linked_to(target.server.clone());
            let changed = self.store.query_sales_orders(&filter).await?;
            debug!(server = %target.server, count = changed.len(), "Locally changed sales orders");

            for order in changed {
                let Some(remote_id) = order
                    .link
                    .as_ref()
                    .and_then(|link| link.remote_id.clone())
                else {
                    continue;
                };
                if seen.contains(&remote_id) || order.is_cancelled() {
                    continue;
                }

                if target.config.enable_so_status_sync && edited_since_sync(&order) {
                    let outcome = status.push(target, &order).await;
                    debug!(sales_order = %order.name, ?outcome, "Status push");
                }

                let name = order.name.clone();
                let result = match self.fetch_order(target, &name, &remote_id).await {
                    Ok(record) => sales_orders.sync_remote(target, &record).await,
                    Err(e) => Err(e),
                };
                match result {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => record_failure(&errors, &mut report, &target.server, name.as_str(), &e).await,
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(PassOutcome {
            scope: SyncScope::SalesOrders,
            checkpoint: checkpoint.advance_to(pass_start),
            report,
        })
    }

    async fn fetch_order(
        &self,
        target: &SyncTarget,
        order: &RecordName,
        remote_id: &RemoteId,
    ) -> Result<RemoteRecord, SyncError> {
        match with_retry(&self.retry, "fetch_order", || {
            target.remote.fetch_by_id(&RemoteEntity::Order, remote_id)
        })
        .await
        {
            Ok(record) => Ok(record),
            Err(RemoteApiError::NotFound(_)) => Err(SyncError::RemoteOrderNotFound {
                order: order.to_string(),
                remote_id: remote_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Stock pass
    // ========================================================================

    /// Push stock levels of every linked stock item
    #[tracing::instrument(skip(self))]
    pub async fn run_stock_sync(&self) -> Result<PassOutcome, SyncError> {
        self.locked(SyncScope::Stock, |errors| self.stock_pass(errors))
            .await
    }

    async fn stock_pass(&self, errors: ErrorLogger) -> Result<PassOutcome, SyncError> {
        let started = Instant::now();
        let pass_start = Utc::now();
        let stock = StockSynchronizer::new(Arc::clone(&self.store));
        let mut report = SyncReport::default();

        for target in self
            .enabled_targets()
            .filter(|t| t.config.enable_stock_level_sync)
        {
            let filter = ItemFilter::new().with_linked_to(target.server.clone());
            let items = self.store.query_items(&filter).await?;
            debug!(server = %target.server, count = items.len(), "Linked items for stock push");

            for item in items {
                let code = item.item_code.clone();
                match stock.push(target, item).await {
                    Ok(outcome) => report.record(outcome),
                    Err(e) => record_failure(&errors, &mut report, &target.server, code.as_str(), &e).await,
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(PassOutcome {
            scope: SyncScope::Stock,
            checkpoint: Checkpoint::at(pass_start),
            report,
        })
    }

    // ========================================================================
    // Single records
    // ========================================================================

    /// Sync one item with every enabled server it is linked to
    #[tracing::instrument(skip(self))]
    pub async fn sync_single_item(&self, code: &ItemCode) -> Result<SyncReport, SyncError> {
        let started = Instant::now();
        let item = self
            .store
            .get_item(code)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("item {code}")))?;
        if item.links.is_empty() {
            return Err(SyncError::NotLinked(format!("item {code}")));
        }

        let items = self.item_synchronizer(&self.errors);
        let mut report = SyncReport::default();
        for target in self.enabled_targets() {
            // Reload: a previous server's sync may have changed the item
            let Some(item) = self.store.get_item(code).await? else {
                break;
            };
            if item.links.for_server(&target.server).is_none() {
                continue;
            }
            match items.sync_local(target, item).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => record_failure(&self.errors, &mut report, &target.server, code.as_str(), &e).await,
            }
        }
        report.duration_ms = started.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Sync one sales order with its remote order
    ///
    /// # Errors
    /// `SyncDisabled` when the linked server is disabled and
    /// `RemoteOrderNotFound` when the remote order no longer exists.
    #[tracing::instrument(skip(self))]
    pub async fn sync_single_order(&self, name: &RecordName) -> Result<RecordOutcome, SyncError> {
        let order = self.load_order(name).await?;
        let link = order
            .link
            .clone()
            .ok_or_else(|| SyncError::NotLinked(format!("sales order {name}")))?;
        let target = self.enabled_target(&link.server)?;
        let remote_id = link
            .remote_id
            .ok_or_else(|| SyncError::NotLinked(format!("sales order {name}")))?;

        let result = match self.fetch_order(target, name, &remote_id).await {
            Ok(record) => {
                self.sales_order_synchronizer(&self.errors)
                    .sync_remote(target, &record)
                    .await
            }
            Err(e) => Err(e),
        };
        self.logged(&target.server, name.as_str(), result).await
    }

    /// Fetch one remote order by id and sync it
    #[tracing::instrument(skip(self))]
    pub async fn sync_single_remote_order(
        &self,
        server: &ServerId,
        remote_id: &RemoteId,
    ) -> Result<RecordOutcome, SyncError> {
        let target = self.enabled_target(server)?;
        let record = match target
            .remote
            .fetch_by_id(&RemoteEntity::Order, remote_id)
            .await
        {
            Ok(record) => record,
            Err(RemoteApiError::NotFound(_)) => {
                return Err(SyncError::RemoteOrderNotFound {
                    order: format!("order {remote_id}"),
                    remote_id: remote_id.clone(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        self.sync_remote_order_record(server, &record).await
    }

    /// Sync an order document received from the server (webhooks)
    pub async fn sync_remote_order_record(
        &self,
        server: &ServerId,
        record: &RemoteRecord,
    ) -> Result<RecordOutcome, SyncError> {
        let target = self.enabled_target(server)?;
        let result = self
            .sales_order_synchronizer(&self.errors)
            .sync_remote(target, record)
            .await;
        self.logged(server, record.id().as_str(), result).await
    }

    /// Push the mapped local status of a sales order to its remote order
    #[tracing::instrument(skip(self))]
    pub async fn push_order_status(&self, name: &RecordName) -> Result<PushOutcome, SyncError> {
        let order = self.load_order(name).await?;
        let Some(link) = order.link.as_ref() else {
            return Ok(PushOutcome::NotLinked);
        };
        let target = self.target(&link.server)?;
        Ok(OrderStatusSynchronizer::new(self.errors.clone())
            .push(target, &order)
            .await)
    }

    async fn load_order(&self, name: &RecordName) -> Result<SalesOrder, SyncError> {
        self.store
            .get_sales_order(name)
            .await?
            .ok_or_else(|| SyncError::NotFound(format!("sales order {name}")))
    }

    async fn logged<T>(
        &self,
        server: &ServerId,
        record: &str,
        result: Result<T, SyncError>,
    ) -> Result<T, SyncError> {
        if let Err(e) = &result {
            self.errors.log_record_failure(Some(server), record, e).await;
        }
        result
    }
}

/// The sales order was edited locally after its last successful sync
fn edited_since_sync(order: &SalesOrder) -> bool {
    order
        .link
        .as_ref()
        .and_then(|link| link.last_local_modified)
        .map_or(true, |synced| order.modified > synced)
}
