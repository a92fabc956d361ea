//! # Run Reports
//!
//! Counters describing what an upgrade run did, for the caller to log.

use serde::Serialize;

/// Outcome of one augmentation phase.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    /// Records read.
    pub examined: usize,
    /// Records of a qualifying variant.
    pub qualifying: usize,
    /// Records rewritten.
    pub updated: usize,
    /// Qualifying records left alone because they were already upgraded
    /// (only under `PhaseGuard::Resumable`).
    pub already_upgraded: usize,
}

/// Oracle and cache counters of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    /// Lookups answered from the run cache.
    pub cache_hits: u64,
    /// Lookups that went to the oracle (successful or not).
    pub oracle_calls: u64,
}

/// Outcome of the block-hash backfill.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// State change phase.
    pub state_changes: PhaseReport,
    /// Event phase.
    pub events: PhaseReport,
    /// Snapshot phase.
    pub snapshots: PhaseReport,
    /// Pending-transaction fragments that received a trigger hash.
    pub pending_transactions_resolved: usize,
    /// Oracle usage of the run.
    pub resolver: ResolverStats,
}

/// Result of invoking an upgrade step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationOutcome {
    /// The version the store should be stamped with.
    pub new_version: u32,
    /// `None` when the step did not apply to the current version.
    pub report: Option<MigrationReport>,
}

impl MigrationOutcome {
    /// Whether the step actually touched the store.
    pub fn ran(&self) -> bool {
        self.report.is_some()
    }
}
