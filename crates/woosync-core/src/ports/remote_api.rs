//! Remote API port (driven/secondary port)
//!
//! This module defines the interface to the REST resources of one
//! WooCommerce server. The adapter lives in `woosync-api`.
//!
//! ## Design Notes
//!
//! - Unlike the storage ports this one returns a classified error:
//!   synchronisers must tell network failures, rejected credentials and
//!   missing records apart.
//! - Bodies are passed as `serde_json::Value` so field mappings can write
//!   arbitrary members (including `meta_data` entries).

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{RemoteEntity, RemoteId, RemoteRecord, ServerId};

/// Failure talking to a remote server
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteApiError {
    /// The server could not be reached or the connection dropped
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials were rejected (401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The resource does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("Server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error text from the response body
        message: String,
    },

    /// The response body could not be decoded into a record
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RemoteApiError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteApiError::Network(_) => true,
            RemoteApiError::Server { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Port trait for the REST resources of one WooCommerce server
#[async_trait::async_trait]
pub trait IRemoteApi: Send + Sync {
    /// Server this client talks to
    fn server(&self) -> &ServerId;

    /// Records of `entity` modified at or after `since`
    ///
    /// Implementations page through the whole collection. For orders the
    /// result includes trashed orders.
    async fn fetch_modified_since(
        &self,
        entity: &RemoteEntity,
        since: DateTime<Utc>,
    ) -> Result<Vec<RemoteRecord>, RemoteApiError>;

    /// One record by id
    async fn fetch_by_id(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
    ) -> Result<RemoteRecord, RemoteApiError>;

    /// Partial update; returns the record as stored remotely
    async fn update(
        &self,
        entity: &RemoteEntity,
        id: &RemoteId,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError>;

    /// Create a record; returns it with its assigned id
    async fn create(
        &self,
        entity: &RemoteEntity,
        fields: Value,
    ) -> Result<RemoteRecord, RemoteApiError>;
}
