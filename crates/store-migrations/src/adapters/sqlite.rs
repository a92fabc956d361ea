//! SQLite-backed record store.
//!
//! Table layout of a version 18/19 store:
//!
//! ```text
//! state_changes (identifier INTEGER PRIMARY KEY, data TEXT)
//! state_events  (identifier INTEGER PRIMARY KEY, source_statechange_id INTEGER, data TEXT)
//! state_snapshot(identifier INTEGER PRIMARY KEY, statechange_id INTEGER, data TEXT)
//! settings      (name TEXT PRIMARY KEY, value TEXT)
//! ```
//!
//! Each bulk update runs in its own transaction.

use crate::domain::{
    EventId, EventRecord, SnapshotId, SnapshotRecord, StateChangeId, StateChangeRecord,
    StorageError,
};
use crate::ports::RecordStorage;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS state_changes (
        identifier INTEGER PRIMARY KEY,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS state_events (
        identifier INTEGER PRIMARY KEY,
        source_statechange_id INTEGER NOT NULL,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS state_snapshot (
        identifier INTEGER PRIMARY KEY,
        statechange_id INTEGER NOT NULL,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS settings (
        name TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

const VERSION_SETTING: &str = "version";

fn db_err(err: rusqlite::Error) -> StorageError {
    StorageError::Database(err.to_string())
}

fn to_row_id(identifier: u64) -> Result<i64, StorageError> {
    i64::try_from(identifier)
        .map_err(|_| StorageError::Corrupt(format!("identifier {identifier} exceeds i64")))
}

fn from_row_id(identifier: i64) -> Result<u64, StorageError> {
    u64::try_from(identifier)
        .map_err(|_| StorageError::Corrupt(format!("negative identifier {identifier}")))
}

/// Record store over a SQLite database file.
pub struct SqliteRecordStorage {
    conn: Connection,
}

impl SqliteRecordStorage {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        debug!("[migrate] Opened record store at {}", path.as_ref().display());
        Self::bootstrap(conn)
    }

    /// Fresh database living in memory.
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::bootstrap(Connection::open_in_memory().map_err(db_err)?)
    }

    fn bootstrap(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Insert a state change row.
    pub fn insert_state_change(
        &mut self,
        identifier: StateChangeId,
        data: &str,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO state_changes (identifier, data) VALUES (?1, ?2)",
                params![to_row_id(identifier.0)?, data],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Insert an event row.
    pub fn insert_event(
        &mut self,
        identifier: EventId,
        state_change: StateChangeId,
        data: &str,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO state_events (identifier, source_statechange_id, data) \
                 VALUES (?1, ?2, ?3)",
                params![to_row_id(identifier.0)?, to_row_id(state_change.0)?, data],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Insert a snapshot row.
    pub fn insert_snapshot(
        &mut self,
        identifier: SnapshotId,
        state_change: StateChangeId,
        data: &str,
    ) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO state_snapshot (identifier, statechange_id, data) VALUES (?1, ?2, ?3)",
                params![to_row_id(identifier.0)?, to_row_id(state_change.0)?, data],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn query_linked_rows(&self, sql: &str) -> Result<Vec<(u64, u64, String)>, StorageError> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (identifier, reference, data) = row.map_err(db_err)?;
            out.push((from_row_id(identifier)?, from_row_id(reference)?, data));
        }
        Ok(out)
    }

    /// Run `statement` once per `(identifier, data)` pair inside one
    /// transaction. Fails without committing if any row is missing.
    fn update_rows(
        &mut self,
        table: &'static str,
        statement: &str,
        rows: Vec<(u64, String)>,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction().map_err(db_err)?;
        {
            let mut stmt = tx.prepare(statement).map_err(db_err)?;
            for (identifier, data) in rows {
                let changed = stmt
                    .execute(params![data, to_row_id(identifier)?])
                    .map_err(db_err)?;
                if changed == 0 {
                    return Err(StorageError::UnknownRecord { table, identifier });
                }
            }
        }
        tx.commit().map_err(db_err)
    }
}

impl RecordStorage for SqliteRecordStorage {
    fn get_all_state_changes(&self) -> Result<Vec<StateChangeRecord>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, data FROM state_changes ORDER BY identifier")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let (identifier, data) = row.map_err(db_err)?;
            out.push(StateChangeRecord {
                identifier: StateChangeId(from_row_id(identifier)?),
                data,
            });
        }
        Ok(out)
    }

    fn get_all_event_records(&self) -> Result<Vec<EventRecord>, StorageError> {
        Ok(self
            .query_linked_rows(
                "SELECT identifier, source_statechange_id, data FROM state_events \
                 ORDER BY identifier",
            )?
            .into_iter()
            .map(|(identifier, state_change, data)| EventRecord {
                identifier: EventId(identifier),
                state_change_identifier: StateChangeId(state_change),
                data,
            })
            .collect())
    }

    fn get_state_changes_by_identifier(
        &self,
        from: StateChangeId,
        to: StateChangeId,
    ) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT data FROM state_changes \
                 WHERE identifier BETWEEN ?1 AND ?2 ORDER BY identifier",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![to_row_id(from.0)?, to_row_id(to.0)?], |row| {
                row.get::<_, String>(0)
            })
            .map_err(db_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn get_snapshots(&self) -> Result<Vec<SnapshotRecord>, StorageError> {
        Ok(self
            .query_linked_rows(
                "SELECT identifier, statechange_id, data FROM state_snapshot ORDER BY identifier",
            )?
            .into_iter()
            .map(|(identifier, state_change, data)| SnapshotRecord {
                identifier: SnapshotId(identifier),
                state_change_identifier: StateChangeId(state_change),
                data,
            })
            .collect())
    }

    fn update_state_changes(&mut self, batch: Vec<StateChangeRecord>) -> Result<(), StorageError> {
        self.update_rows(
            "state_changes",
            "UPDATE state_changes SET data = ?1 WHERE identifier = ?2",
            batch.into_iter().map(|r| (r.identifier.0, r.data)).collect(),
        )
    }

    fn update_events(&mut self, batch: Vec<EventRecord>) -> Result<(), StorageError> {
        self.update_rows(
            "state_events",
            "UPDATE state_events SET data = ?1 WHERE identifier = ?2",
            batch.into_iter().map(|r| (r.identifier.0, r.data)).collect(),
        )
    }

    fn update_snapshot(
        &mut self,
        identifier: SnapshotId,
        data: String,
    ) -> Result<(), StorageError> {
        self.update_rows(
            "state_snapshot",
            "UPDATE state_snapshot SET data = ?1 WHERE identifier = ?2",
            vec![(identifier.0, data)],
        )
    }

    fn read_version(&self) -> Result<Option<u32>, StorageError> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE name = ?1",
                params![VERSION_SETTING],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        value
            .map(|v| {
                v.parse::<u32>()
                    .map_err(|_| StorageError::Corrupt(format!("stored version {v:?}")))
            })
            .transpose()
    }

    fn write_version(&mut self, version: u32) -> Result<(), StorageError> {
        self.conn
            .execute(
                "INSERT INTO settings (name, value) VALUES (?1, ?2) \
                 ON CONFLICT(name) DO UPDATE SET value = excluded.value",
                params![VERSION_SETTING, version.to_string()],
            )
            .map_err(db_err)?;
        Ok(())
    }
}
