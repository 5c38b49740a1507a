//! ErrorLogger - persisted error log service
//!
//! Wraps `ISyncStateRepository::save_error_log()` with convenience methods
//! for each kind of failure a pass can hit. All methods are non-fatal:
//! errors in error log persistence are reported via `tracing::warn!` but
//! never propagated.

use std::fmt::Display;
use std::sync::Arc;

use serde_json::json;
use woosync_core::{
    domain::{ErrorKind, ErrorLogEntry, ErrorLogId, RunId, ServerId, SyncScope},
    ports::ISyncStateRepository,
};

use crate::reason::Classify;

/// Records failures as reviewable error log entries.
///
/// A logger obtained through [`ErrorLogger::for_pass`] stamps every entry
/// with the pass id and scope.
#[derive(Clone)]
pub struct ErrorLogger {
    state: Arc<dyn ISyncStateRepository>,
    run_id: Option<RunId>,
    scope: Option<SyncScope>,
}

impl ErrorLogger {
    /// Creates a new `ErrorLogger` backed by the given state repository.
    pub fn new(state: Arc<dyn ISyncStateRepository>) -> Self {
        Self {
            state,
            run_id: None,
            scope: None,
        }
    }

    /// A logger whose entries belong to one pass.
    pub fn for_pass(&self, run_id: RunId, scope: SyncScope) -> Self {
        Self {
            state: Arc::clone(&self.state),
            run_id: Some(run_id),
            scope: Some(scope),
        }
    }

    /// Pass id attached to entries, if any
    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Persist an entry, swallowing errors with a tracing warning.
    ///
    /// Pass context is attached unless the entry already carries it.
    pub async fn log(&self, mut entry: ErrorLogEntry) -> Option<ErrorLogId> {
        if entry.run_id().is_none() {
            if let Some(run_id) = self.run_id {
                entry = entry.with_run_id(run_id);
            }
        }
        if entry.scope().is_none() {
            if let Some(scope) = self.scope {
                entry = entry.with_scope(scope);
            }
        }

        tracing::warn!(
            kind = %entry.kind(),
            record = entry.record().unwrap_or("-"),
            server = entry.server().map(ServerId::as_str).unwrap_or("-"),
            message = entry.message(),
            "Record failed"
        );

        match self.state.save_error_log(&entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save error log entry");
                None
            }
        }
    }

    // ========================================================================
    // Record failures
    // ========================================================================

    /// Log a failed record, classifying the error.
    pub async fn log_record_failure<E>(
        &self,
        server: Option<&ServerId>,
        record: &str,
        error: &E,
    ) -> Option<ErrorLogId>
    where
        E: Classify + Display + Sync,
    {
        let mut entry = ErrorLogEntry::new(error.error_kind(), error.to_string()).with_record(record);
        if let Some(server) = server {
            entry = entry.with_server(server.clone());
        }
        self.log(entry).await
    }

    /// Log a record that failed for a reason outside the classified error types.
    pub async fn log_internal(
        &self,
        server: Option<&ServerId>,
        record: &str,
        error: &(dyn Display + Sync),
    ) -> Option<ErrorLogId> {
        let mut entry = ErrorLogEntry::new(ErrorKind::Internal, error.to_string()).with_record(record);
        if let Some(server) = server {
            entry = entry.with_server(server.clone());
        }
        self.log(entry).await
    }

    /// Log a field-map rule whose expression could not be used.
    pub async fn log_mapping_error(
        &self,
        server: &ServerId,
        local_field: &str,
        message: &str,
    ) -> Option<ErrorLogId> {
        let entry = ErrorLogEntry::new(
            ErrorKind::MappingExpression,
            format!("field mapping for '{local_field}' skipped: {message}"),
        )
        .with_server(server.clone())
        .with_record(local_field)
        .with_details(json!({ "local_field": local_field }));
        self.log(entry).await
    }

    /// Log an order whose shipping method has no configured shipping rule.
    pub async fn log_unmapped_shipping(
        &self,
        server: &ServerId,
        order: &str,
        method_title: &str,
    ) -> Option<ErrorLogId> {
        let entry = ErrorLogEntry::new(
            ErrorKind::IdentityAmbiguity,
            format!("no shipping rule mapped for method '{method_title}'"),
        )
        .with_server(server.clone())
        .with_record(order)
        .with_details(json!({ "method_title": method_title }));
        self.log(entry).await
    }

    /// Log a paid order whose payment method has no account mapping.
    pub async fn log_unmapped_payment_method(
        &self,
        server: &ServerId,
        order: &str,
        payment_method: &str,
    ) -> Option<ErrorLogId> {
        let entry = ErrorLogEntry::new(
            ErrorKind::Validation,
            format!("payment method '{payment_method}' has no account mapping"),
        )
        .with_server(server.clone())
        .with_record(order)
        .with_details(json!({ "payment_method": payment_method }));
        self.log(entry).await
    }

    /// Log a status push that the remote side rejected or never received.
    pub async fn log_status_push_failure(
        &self,
        server: &ServerId,
        order: &str,
        remote_status: &str,
        error: &(dyn Display + Sync),
    ) -> Option<ErrorLogId> {
        let entry = ErrorLogEntry::new(
            ErrorKind::StatusPush,
            format!("could not set remote status '{remote_status}': {error}"),
        )
        .with_server(server.clone())
        .with_record(order)
        .with_details(json!({ "remote_status": remote_status }));
        self.log(entry).await
    }

    // ========================================================================
    // Pass failures
    // ========================================================================

    /// Log a pass that aborted before completing its batch.
    pub async fn log_pass_failure(
        &self,
        server: Option<&ServerId>,
        error: &(dyn Display + Sync),
    ) -> Option<ErrorLogId> {
        tracing::error!(
            scope = self.scope.map(|s| s.as_str()).unwrap_or("-"),
            error = %error,
            "Sync pass aborted"
        );
        let mut entry = ErrorLogEntry::new(ErrorKind::Internal, format!("pass aborted: {error}"));
        if let Some(server) = server {
            entry = entry.with_server(server.clone());
        }
        self.log(entry).await
    }
}
