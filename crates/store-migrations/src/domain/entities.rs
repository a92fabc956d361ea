//! # Persisted Records
//!
//! Rows of the three record tables as the storage collaborator hands them out.
//! Payloads stay in their raw JSON text form; the algorithms parse them.

use super::value_objects::{EventId, SnapshotId, StateChangeId};
use std::fmt;

/// A persisted state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateChangeRecord {
    /// Ordinal identifier.
    pub identifier: StateChangeId,
    /// JSON payload.
    pub data: String,
}

/// A persisted event, owned by exactly one state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    /// Ordinal identifier.
    pub identifier: EventId,
    /// The state change that produced this event.
    pub state_change_identifier: StateChangeId,
    /// JSON payload.
    pub data: String,
}

/// A persisted snapshot of accumulated state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotRecord {
    /// Ordinal identifier.
    pub identifier: SnapshotId,
    /// The last state change applied before the snapshot was taken.
    pub state_change_identifier: StateChangeId,
    /// JSON payload.
    pub data: String,
}

/// Points at the record (or embedded fragment) an error is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordRef {
    /// A state change row.
    StateChange(StateChangeId),
    /// An event row.
    Event(EventId),
    /// A snapshot row.
    Snapshot(SnapshotId),
    /// A pending transaction embedded in a snapshot.
    PendingTransaction {
        /// Owning snapshot.
        snapshot: SnapshotId,
        /// Position in `pending_transactions`.
        index: usize,
    },
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::StateChange(id) => write!(f, "{}", id),
            RecordRef::Event(id) => write!(f, "{}", id),
            RecordRef::Snapshot(id) => write!(f, "{}", id),
            RecordRef::PendingTransaction { snapshot, index } => {
                write!(f, "{} pending_transactions[{}]", snapshot, index)
            }
        }
    }
}
