//! Error log entries
//!
//! Record-level failures never abort a batch pass. They are persisted as
//! [`ErrorLogEntry`] values so that they can be reviewed after the fact
//! (`woosync errors`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checkpoint::SyncScope;
use super::newtypes::{ErrorLogId, RunId, ServerId};

/// Category of a logged failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote API unreachable or returned a server error
    Transport,
    /// Remote API rejected the credentials
    Auth,
    /// A referenced remote record does not exist
    NotFound,
    /// A field-mapping expression is malformed
    MappingExpression,
    /// A reference could not be resolved (e.g. unmapped shipping method)
    IdentityAmbiguity,
    /// A record failed validation (e.g. missing billing email)
    Validation,
    /// An order status could not be pushed
    StatusPush,
    /// Anything else, including store failures
    Internal,
}

impl ErrorKind {
    /// Stable storage key
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Auth => "auth",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MappingExpression => "mapping_expression",
            ErrorKind::IdentityAmbiguity => "identity_ambiguity",
            ErrorKind::Validation => "validation",
            ErrorKind::StatusPush => "status_push",
            ErrorKind::Internal => "internal",
        }
    }

    /// Inverse of [`ErrorKind::as_str`]; unknown keys map to `Internal`
    pub fn from_key(key: &str) -> Self {
        match key {
            "transport" => ErrorKind::Transport,
            "auth" => ErrorKind::Auth,
            "not_found" => ErrorKind::NotFound,
            "mapping_expression" => ErrorKind::MappingExpression,
            "identity_ambiguity" => ErrorKind::IdentityAmbiguity,
            "validation" => ErrorKind::Validation,
            "status_push" => ErrorKind::StatusPush,
            _ => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted failure with enough context to diagnose it later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    id: Option<ErrorLogId>,
    timestamp: DateTime<Utc>,
    run_id: Option<RunId>,
    scope: Option<SyncScope>,
    kind: ErrorKind,
    record: Option<String>,
    server: Option<ServerId>,
    message: String,
    details: Value,
}

impl ErrorLogEntry {
    /// A new entry stamped with the current time
    ///
    /// # Example
    ///
    /// ```
    /// use woosync_core::domain::{ErrorKind, ErrorLogEntry};
    ///
    /// let entry = ErrorLogEntry::new(ErrorKind::Auth, "401 from shop.example.com")
    ///     .with_record("SO-0001");
    /// assert_eq!(entry.record(), Some("SO-0001"));
    /// assert!(entry.id().is_none());
    /// ```
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            id: None,
            timestamp: Utc::now(),
            run_id: None,
            scope: None,
            kind,
            record: None,
            server: None,
            message: message.into(),
            details: Value::Null,
        }
    }

    /// Database id (None until persisted)
    pub fn id(&self) -> Option<ErrorLogId> {
        self.id
    }

    /// Set the database id
    pub fn with_id(mut self, id: ErrorLogId) -> Self {
        self.id = Some(id);
        self
    }

    /// When the failure happened
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Override the timestamp (used when loading from storage)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Pass that produced the entry
    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    /// Attach the pass id
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Scope of the pass
    pub fn scope(&self) -> Option<SyncScope> {
        self.scope
    }

    /// Attach the scope
    pub fn with_scope(mut self, scope: SyncScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Affected record (item code, order name, remote id)
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }

    /// Attach the affected record
    pub fn with_record(mut self, record: impl Into<String>) -> Self {
        self.record = Some(record.into());
        self
    }

    /// Server involved
    pub fn server(&self) -> Option<&ServerId> {
        self.server.as_ref()
    }

    /// Attach the server
    pub fn with_server(mut self, server: ServerId) -> Self {
        self.server = Some(server);
        self
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured context
    pub fn details(&self) -> &Value {
        &self.details
    }

    /// Attach structured context
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}
