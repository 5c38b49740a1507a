//! Error types for reconciliation and mapping

use thiserror::Error;
use woosync_core::domain::{DomainError, PathQueryError, RemoteId};

/// Errors raised while resolving identities or evaluating mappings
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// A mapping rule's expression does not parse
    #[error("invalid mapping for '{local_field}': {source}")]
    InvalidExpression {
        local_field: String,
        #[source]
        source: PathQueryError,
    },

    /// The remote record lacks the attribute its local identity is derived from
    #[error("cannot derive identity: {0}")]
    MissingIdentity(String),

    /// A registered customer's order has no billing email
    #[error("order {order} has no billing email")]
    MissingBillingEmail { order: RemoteId },

    /// A derived identity failed validation
    #[error(transparent)]
    Domain(#[from] DomainError),
}
