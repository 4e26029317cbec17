//! Sync results and the run report.

use crate::error::{ConfluenceError, error_chain};

/// Why a document was not sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Remote page already matches.
    Unchanged,
    /// Document opted out with `sync = false`.
    SyncDisabled,
    /// An ancestor document failed or has no remote page.
    ParentFailed {
        /// Path of the ancestor.
        parent: String,
    },
    /// The run was cancelled before the document was dispatched.
    Cancelled,
}

/// Terminal state of one document or orphan deletion.
#[derive(Debug)]
pub enum SyncOutcome {
    /// Page created.
    Created,
    /// Page updated.
    Updated,
    /// Orphan page deleted.
    Deleted,
    /// Nothing sent.
    Skipped(SkipReason),
    /// Operation failed.
    Failed(ConfluenceError),
}

/// Result for one document, or one orphan entry of the identity store.
#[derive(Debug)]
pub struct SyncResult {
    /// Source path (the identity key for orphans).
    pub path: String,
    /// Identity key.
    pub relative_path: String,
    /// Remote page ID, when one is known.
    pub page_id: Option<String>,
    /// What happened.
    pub outcome: SyncOutcome,
}

impl SyncResult {
    /// Whether the outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Failed(_))
    }
}

/// All results of one run.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Document results in input order, followed by deletions.
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    /// Pages created.
    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Created))
    }

    /// Pages updated.
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Updated))
    }

    /// Pages deleted.
    pub fn deleted(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Deleted))
    }

    /// Documents skipped for any reason.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Skipped(_)))
    }

    /// Failed documents and deletions.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Failed(_)))
    }

    /// True when nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failures with their full cause chain.
    pub fn failures(&self) -> impl Iterator<Item = (&SyncResult, String)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            SyncOutcome::Failed(e) => Some((r, error_chain(e))),
            _ => None,
        })
    }

    /// Result for the document with identity key `relative_path`.
    pub fn get(&self, relative_path: &str) -> Option<&SyncResult> {
        self.results
            .iter()
            .find(|r| r.relative_path == relative_path)
    }

    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| pred(&r.outcome)).count()
    }
}
