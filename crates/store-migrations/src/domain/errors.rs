//! # Domain Errors
//!
//! Every variant of [`MigrationError`] is fatal for the run: the upgrade step
//! aborts and the stored version is left untouched. Only
//! [`MigrationError::OracleUnavailable`] is worth retrying.

use super::entities::RecordRef;
use super::value_objects::{BlockRequest, EventId, SnapshotId, StateChangeId};
use thiserror::Error;

/// Errors raised by an upgrade run.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A persisted payload violates the invariants of its store version.
    #[error("Invalid persisted data in {record}: {reason}")]
    InvalidPersistedData {
        /// The offending record.
        record: RecordRef,
        /// What is wrong with it.
        reason: String,
    },

    /// An event's state-change reference did not resolve to exactly one row.
    #[error("{event_id} references {state_change_id}, which matched {matches} state changes (expected 1)")]
    MissingReference {
        /// The event being upgraded.
        event_id: EventId,
        /// Its stored reference.
        state_change_id: StateChangeId,
        /// How many state changes the reference matched.
        matches: usize,
    },

    /// A pending transaction could not be tied to exactly one upgraded event.
    #[error("{snapshot_id} pending_transactions[{fragment_index}] matched {matches} upgraded events (expected 1)")]
    UnresolvedPendingTransaction {
        /// Snapshot holding the fragment.
        snapshot_id: SnapshotId,
        /// Position of the fragment.
        fragment_index: usize,
        /// How many events had equal content.
        matches: usize,
    },

    /// The chain oracle could not provide a block hash.
    #[error("Chain oracle unavailable for {block}: {source}")]
    OracleUnavailable {
        /// What was requested.
        block: BlockRequest,
        /// Underlying oracle failure.
        #[source]
        source: OracleError,
    },

    /// An event's state change carries neither a block hash nor a block number
    /// and the configured fallback is `Reject`.
    #[error("Cannot derive trigger block for {event_id}: {state_change_id} has neither block_hash nor block_number")]
    UnresolvableTriggerBlock {
        /// The event being upgraded.
        event_id: EventId,
        /// Its owning state change.
        state_change_id: StateChangeId,
    },

    /// The storage collaborator failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// No chain of upgrade steps leads from the stored version to the target.
    #[error("No upgrade path from version {from} to version {to}")]
    NoUpgradePath {
        /// Version found in the store.
        from: u32,
        /// Version the code expects.
        to: u32,
    },
}

impl MigrationError {
    /// Shorthand for [`MigrationError::InvalidPersistedData`].
    pub fn invalid(record: RecordRef, reason: impl Into<String>) -> Self {
        MigrationError::InvalidPersistedData {
            record,
            reason: reason.into(),
        }
    }

    /// Whether rerunning the whole step may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, MigrationError::OracleUnavailable { .. })
    }
}

/// Failures of the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend I/O or query failure.
    #[error("Database error: {0}")]
    Database(String),

    /// An update targeted a row that does not exist.
    #[error("No {table} row with identifier {identifier}")]
    UnknownRecord {
        /// Table name.
        table: &'static str,
        /// Identifier that matched nothing.
        identifier: u64,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

/// Failures of the chain oracle.
#[derive(Debug, Clone, Error)]
pub enum OracleError {
    /// The oracle could not be reached or answered with an error.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The oracle does not know the requested block.
    #[error("Block {0} not found")]
    BlockNotFound(u64),
}
