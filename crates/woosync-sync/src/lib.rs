//! WooSync Sync - Synchronisation passes between WooCommerce and the ERP
//!
//! Provides:
//! - Item, sales order, order status and stock synchronisers
//! - The pass orchestrator (checkpoints, pass locks, retry)
//! - An interval scheduler for the daemon
//! - Signature verification and dispatch for order webhooks
//!
//! ## Modules
//!
//! - [`engine`] - Pass orchestration and single-record sync entry points
//! - [`items`] - Products and variations against ERP items
//! - [`customers`] - Customers, addresses and contacts derived from orders
//! - [`orders`] - Orders against ERP sales orders
//! - [`status`] - Local order status pushed to the remote order
//! - [`stock`] - Warehouse stock pushed to remote stock quantities
//! - [`scheduler`] - Periodic pass execution
//! - [`webhook`] - `order.created` webhook intake

pub mod customers;
pub mod engine;
pub mod items;
pub mod orders;
pub mod report;
pub mod scheduler;
pub mod status;
pub mod stock;
pub mod target;
pub mod webhook;

use thiserror::Error;
use woosync_audit::Classify;
use woosync_core::domain::{DomainError, ErrorKind, RemoteId, ServerId, SyncScope};
use woosync_core::ports::RemoteApiError;
use woosync_reconcile::ReconcileError;

pub use engine::{PassOutcome, SyncOrchestrator};
pub use report::{RecordOutcome, SyncReport};
pub use scheduler::{PassRunner, SyncScheduler};
pub use status::PushOutcome;
pub use target::SyncTarget;
pub use webhook::{WebhookError, WebhookHandler, WebhookOutcome};

/// Errors that can occur during synchronisation
#[derive(Debug, Error)]
pub enum SyncError {
    /// A batch pass was started without a checkpoint and none is configured
    #[error("no checkpoint for {0}; set integration.initial_checkpoint or pass one explicitly")]
    MissingCheckpoint(SyncScope),

    /// Another pass of the same scope holds the lock
    #[error("a {0} pass is already running")]
    PassInProgress(SyncScope),

    /// The server exists but synchronisation is switched off
    #[error("synchronisation is disabled for {0}")]
    SyncDisabled(ServerId),

    /// No configured server (or no remote client) for this id
    #[error("unknown server: {0}")]
    UnknownServer(ServerId),

    /// The remote order behind a local sales order is gone
    #[error("remote order {remote_id} of {order} was not found")]
    RemoteOrderNotFound { order: String, remote_id: RemoteId },

    /// A local record does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A local record has no link to any remote record
    #[error("{0} is not linked to a remote record")]
    NotLinked(String),

    /// The remote API failed
    #[error(transparent)]
    Remote(#[from] RemoteApiError),

    /// The local store failed
    #[error("store error: {0:#}")]
    Store(#[from] anyhow::Error),

    /// Identity resolution or a field mapping failed
    #[error(transparent)]
    Mapping(#[from] ReconcileError),
}

impl From<DomainError> for SyncError {
    fn from(e: DomainError) -> Self {
        SyncError::Mapping(ReconcileError::Domain(e))
    }
}

impl Classify for SyncError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            SyncError::Remote(e) => e.error_kind(),
            SyncError::Mapping(e) => e.error_kind(),
            SyncError::RemoteOrderNotFound { .. } | SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::NotLinked(_) | SyncError::UnknownServer(_) => ErrorKind::IdentityAmbiguity,
            SyncError::MissingCheckpoint(_) | SyncError::SyncDisabled(_) => ErrorKind::Validation,
            SyncError::PassInProgress(_) | SyncError::Store(_) => ErrorKind::Internal,
        }
    }
}
