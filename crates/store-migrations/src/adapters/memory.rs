//! In-memory record store.

use crate::domain::{
    EventId, EventRecord, SnapshotId, SnapshotRecord, StateChangeId, StateChangeRecord,
    StorageError,
};
use crate::ports::RecordStorage;
use serde_json::Value;

/// In-memory record store for unit tests and dry runs.
///
/// Rows are kept as plain lists, so a corrupt store with duplicate
/// identifiers can be seeded on purpose. Every mutating trait call counts as
/// one write.
#[derive(Debug, Default)]
pub struct InMemoryRecordStorage {
    state_changes: Vec<StateChangeRecord>,
    events: Vec<EventRecord>,
    snapshots: Vec<SnapshotRecord>,
    version: Option<u32>,
    writes: usize,
}

impl InMemoryRecordStorage {
    /// Empty, unversioned store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored version without counting a write.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    /// Append a state change under the next free identifier.
    pub fn insert_state_change(&mut self, payload: Value) -> StateChangeId {
        let identifier =
            StateChangeId(next_id(self.state_changes.iter().map(|r| r.identifier.0)));
        self.insert_state_change_with_id(identifier, &payload.to_string());
        identifier
    }

    /// Append a state change row verbatim, even if `identifier` is taken.
    pub fn insert_state_change_with_id(&mut self, identifier: StateChangeId, data: &str) {
        self.state_changes.push(StateChangeRecord {
            identifier,
            data: data.to_string(),
        });
    }

    /// Append an event owned by `state_change`.
    pub fn insert_event(&mut self, state_change: StateChangeId, payload: Value) -> EventId {
        let identifier = EventId(next_id(self.events.iter().map(|r| r.identifier.0)));
        self.events.push(EventRecord {
            identifier,
            state_change_identifier: state_change,
            data: payload.to_string(),
        });
        identifier
    }

    /// Append a snapshot taken at `state_change`.
    pub fn insert_snapshot(&mut self, state_change: StateChangeId, payload: Value) -> SnapshotId {
        let identifier = SnapshotId(next_id(self.snapshots.iter().map(|r| r.identifier.0)));
        self.snapshots.push(SnapshotRecord {
            identifier,
            state_change_identifier: state_change,
            data: payload.to_string(),
        });
        identifier
    }

    /// Copy of the state change rows in insertion order.
    pub fn state_changes(&self) -> Vec<StateChangeRecord> {
        self.state_changes.clone()
    }

    /// Copy of the event rows in insertion order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.clone()
    }

    /// Copy of the snapshot rows in insertion order.
    pub fn snapshots(&self) -> Vec<SnapshotRecord> {
        self.snapshots.clone()
    }

    /// Mutating calls received so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

fn next_id(existing: impl Iterator<Item = u64>) -> u64 {
    existing.max().map_or(1, |max| max + 1)
}

impl RecordStorage for InMemoryRecordStorage {
    fn get_all_state_changes(&self) -> Result<Vec<StateChangeRecord>, StorageError> {
        let mut rows = self.state_changes.clone();
        rows.sort_by_key(|r| r.identifier);
        Ok(rows)
    }

    fn get_all_event_records(&self) -> Result<Vec<EventRecord>, StorageError> {
        let mut rows = self.events.clone();
        rows.sort_by_key(|r| r.identifier);
        Ok(rows)
    }

    fn get_state_changes_by_identifier(
        &self,
        from: StateChangeId,
        to: StateChangeId,
    ) -> Result<Vec<String>, StorageError> {
        Ok(self
            .get_all_state_changes()?
            .into_iter()
            .filter(|r| r.identifier >= from && r.identifier <= to)
            .map(|r| r.data)
            .collect())
    }

    fn get_snapshots(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        let mut rows = self.snapshots.clone();
        rows.sort_by_key(|r| r.identifier);
        Ok(rows)
    }

    fn update_state_changes(&mut self, batch: Vec<StateChangeRecord>) -> Result<(), StorageError> {
        self.writes += 1;
        // A batch naming an unknown row applies nothing.
        for record in &batch {
            if !self.state_changes.iter().any(|r| r.identifier == record.identifier) {
                return Err(StorageError::UnknownRecord {
                    table: "state_changes",
                    identifier: record.identifier.0,
                });
            }
        }
        for record in batch {
            for row in self
                .state_changes
                .iter_mut()
                .filter(|r| r.identifier == record.identifier)
            {
                row.data = record.data.clone();
            }
        }
        Ok(())
    }

    fn update_events(&mut self, batch: Vec<EventRecord>) -> Result<(), StorageError> {
        self.writes += 1;
        for record in &batch {
            if !self.events.iter().any(|r| r.identifier == record.identifier) {
                return Err(StorageError::UnknownRecord {
                    table: "state_events",
                    identifier: record.identifier.0,
                });
            }
        }
        for record in batch {
            for row in self
                .events
                .iter_mut()
                .filter(|r| r.identifier == record.identifier)
            {
                row.data = record.data.clone();
            }
        }
        Ok(())
    }

    fn update_snapshot(
        &mut self,
        identifier: SnapshotId,
        data: String,
    ) -> Result<(), StorageError> {
        self.writes += 1;
        let row = self
            .snapshots
            .iter_mut()
            .find(|r| r.identifier == identifier)
            .ok_or(StorageError::UnknownRecord {
                table: "state_snapshot",
                identifier: identifier.0,
            })?;
        row.data = data;
        Ok(())
    }

    fn read_version(&self) -> Result<Option<u32>, StorageError> {
        Ok(self.version)
    }

    fn write_version(&mut self, version: u32) -> Result<(), StorageError> {
        self.writes += 1;
        self.version = Some(version);
        Ok(())
    }
}
