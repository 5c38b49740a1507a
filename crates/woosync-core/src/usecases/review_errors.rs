//! Error log review use case
//!
//! Powers `woosync errors`: reads back the entries persisted by failed
//! records and aborted passes.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ErrorLogEntry;
use crate::ports::ISyncStateRepository;

/// Counts of error log entries per kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorSummary {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
}

/// Reads the persisted error log
pub struct ReviewErrorsUseCase {
    state: Arc<dyn ISyncStateRepository>,
}

impl ReviewErrorsUseCase {
    pub fn new(state: Arc<dyn ISyncStateRepository>) -> Self {
        Self { state }
    }

    /// Entries since `since`, newest first
    pub async fn recent(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<ErrorLogEntry>> {
        self.state
            .get_error_logs_since(since, limit)
            .await
            .context("Failed to read error log")
    }

    /// Group entries by kind
    pub fn summarize(entries: &[ErrorLogEntry]) -> ErrorSummary {
        let mut summary = ErrorSummary {
            total: entries.len(),
            ..ErrorSummary::default()
        };
        for entry in entries {
            *summary
                .by_kind
                .entry(entry.kind().as_str().to_string())
                .or_insert(0) += 1;
        }
        summary
    }
}
