//! Pass and record outcomes

use std::fmt::Display;

use serde::Serialize;

/// What happened to one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// A local record was created from a remote one
    CreatedLocal,
    /// A local record was updated from its remote counterpart
    UpdatedLocal,
    /// A remote record was created from a local one
    CreatedRemote,
    /// A remote record was updated from its local counterpart
    UpdatedRemote,
    /// Nothing was written
    Skipped,
}

/// Summary of a pass or a single-record sync
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub created_local: u32,
    pub updated_local: u32,
    pub created_remote: u32,
    pub updated_remote: u32,
    pub skipped: u32,
    /// Records that failed; each one is also in the error log
    pub failed: u32,
    /// `record: message` per failure
    pub errors: Vec<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Count one record outcome
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::CreatedLocal => self.created_local += 1,
            RecordOutcome::UpdatedLocal => self.updated_local += 1,
            RecordOutcome::CreatedRemote => self.created_remote += 1,
            RecordOutcome::UpdatedRemote => self.updated_remote += 1,
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Count one failed record
    pub fn record_failure(&mut self, record: &str, error: &dyn Display) {
        self.failed += 1;
        self.errors.push(format!("{record}: {error}"));
    }

    /// Records written on either side
    pub fn writes(&self) -> u32 {
        self.created_local + self.updated_local + self.created_remote + self.updated_remote
    }

    /// Records looked at, failed ones included
    pub fn processed(&self) -> u32 {
        self.writes() + self.skipped + self.failed
    }

    /// Add another report's counts to this one
    pub fn merge(&mut self, other: SyncReport) {
        self.created_local += other.created_local;
        self.updated_local += other.updated_local;
        self.created_remote += other.created_remote;
        self.updated_remote += other.updated_remote;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.duration_ms += other.duration_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_outcome() {
        let mut report = SyncReport::default();
        report.record(RecordOutcome::CreatedLocal);
        report.record(RecordOutcome::UpdatedRemote);
        report.record(RecordOutcome::Skipped);
        report.record_failure("1042", &"HTTP 500");

        assert_eq!(report.writes(), 2);
        assert_eq!(report.processed(), 4);
        assert_eq!(report.errors, vec!["1042: HTTP 500".to_string()]);
    }

    #[test]
    fn merge_adds_counts() {
        let mut a = SyncReport {
            created_local: 1,
            ..SyncReport::default()
        };
        let b = SyncReport {
            created_local: 2,
            failed: 1,
            errors: vec!["x: y".into()],
            ..SyncReport::default()
        };
        a.merge(b);
        assert_eq!(a.created_local, 3);
        assert_eq!(a.failed, 1);
        assert_eq!(a.errors.len(), 1);
    }
}
