//! Counters and per-call reports.

use erpsync_core::Timestamp;

/// Cumulative engine statistics.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Completed backlog runs.
    pub backlog_runs: u64,
    /// Remote calls issued.
    pub remote_calls: u64,
    /// Mappers and tombstones that ended clean.
    pub syncs_succeeded: u64,
    /// Mappers and tombstones left dirty by a failure.
    pub syncs_failed: u64,
    /// Tombstones written.
    pub tombstones_written: u64,
    /// Orders confirmed with their invoice validated.
    pub orders_confirmed: u64,
    /// Payment vouchers posted.
    pub payments_posted: u64,
    /// Last failure.
    pub last_error: Option<String>,
    /// When the backlog last finished.
    pub last_backlog_run: Option<Timestamp>,
}

/// Outcome of one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows synced successfully.
    pub succeeded: usize,
    /// Rows left dirty by a failure.
    pub failed: usize,
    /// Rows marked dirty for the backlog without a remote call.
    pub deferred: usize,
    /// Rows that needed no work.
    pub skipped: usize,
    /// One line per failure.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Returns true if nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Adds another report's counts to this one.
    pub fn merge(&mut self, other: SyncReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.deferred += other.deferred;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_reports() {
        let mut report = SyncReport {
            succeeded: 2,
            ..SyncReport::default()
        };
        assert!(report.is_success());

        report.merge(SyncReport {
            succeeded: 1,
            failed: 1,
            deferred: 0,
            skipped: 3,
            errors: vec!["Category#1 -> product.category: boom".to_string()],
        });

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.is_success());
    }
}
