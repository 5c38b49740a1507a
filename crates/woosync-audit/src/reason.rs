//! Error classification for log entries
//!
//! Every failure persisted to the error log carries an [`ErrorKind`]. The
//! [`Classify`] trait derives it from the error types raised by the remote
//! adapter, the mapping layer and domain validation.

use woosync_core::domain::{DomainError, ErrorKind};
use woosync_core::ports::RemoteApiError;
use woosync_reconcile::ReconcileError;

/// Errors that know which error log category they belong to
pub trait Classify {
    /// Category under which the error is persisted
    fn error_kind(&self) -> ErrorKind;
}

impl Classify for RemoteApiError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            RemoteApiError::Network(_) | RemoteApiError::Server { .. } => ErrorKind::Transport,
            RemoteApiError::Unauthorized(_) => ErrorKind::Auth,
            RemoteApiError::NotFound(_) => ErrorKind::NotFound,
            RemoteApiError::Decode(_) => ErrorKind::Validation,
        }
    }
}

impl Classify for ReconcileError {
    fn error_kind(&self) -> ErrorKind {
        match self {
            ReconcileError::InvalidExpression { .. } => ErrorKind::MappingExpression,
            ReconcileError::MissingIdentity(_) => ErrorKind::IdentityAmbiguity,
            ReconcileError::MissingBillingEmail { .. } | ReconcileError::Domain(_) => {
                ErrorKind::Validation
            }
        }
    }
}

impl Classify for DomainError {
    fn error_kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
