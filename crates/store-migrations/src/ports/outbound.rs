//! # Outbound Ports
//!
//! What an upgrade step needs from the host: the record store and a chain
//! oracle. Both are used synchronously from a single thread; the store is
//! assumed to be exclusively owned for the duration of the run.

use crate::domain::{
    BlockHash, BlockInfo, BlockNumber, BlockRequest, EventRecord, OracleError, SnapshotId,
    SnapshotRecord, StateChangeId, StateChangeRecord, StorageError,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Record store holding the state-change, event and snapshot tables.
///
/// Each write call is atomic on its own; nothing is transactional across
/// calls.
pub trait RecordStorage: Send {
    /// All state changes in identifier order.
    fn get_all_state_changes(&self) -> Result<Vec<StateChangeRecord>, StorageError>;

    /// All events in identifier order.
    fn get_all_event_records(&self) -> Result<Vec<EventRecord>, StorageError>;

    /// Payloads of the state changes with `from <= identifier <= to`.
    fn get_state_changes_by_identifier(
        &self,
        from: StateChangeId,
        to: StateChangeId,
    ) -> Result<Vec<String>, StorageError>;

    /// All snapshots in identifier order.
    fn get_snapshots(&self) -> Result<Vec<SnapshotRecord>, StorageError>;

    /// Replace the payloads of the given state changes in one atomic write.
    fn update_state_changes(&mut self, batch: Vec<StateChangeRecord>) -> Result<(), StorageError>;

    /// Replace the payloads of the given events in one atomic write.
    fn update_events(&mut self, batch: Vec<EventRecord>) -> Result<(), StorageError>;

    /// Replace the payload of one snapshot.
    fn update_snapshot(&mut self, identifier: SnapshotId, data: String) -> Result<(), StorageError>;

    /// The stored version, `None` for a store that was never stamped.
    fn read_version(&self) -> Result<Option<u32>, StorageError>;

    /// Stamp the store with a new version.
    fn write_version(&mut self, version: u32) -> Result<(), StorageError>;
}

/// Source of chain data.
pub trait BlockOracle: Send + Sync {
    /// Fetch a block by number.
    fn block_by_number(&self, number: BlockNumber) -> Result<BlockInfo, OracleError>;

    /// Fetch the current chain head.
    fn latest_block(&self) -> Result<BlockInfo, OracleError>;
}

// =============================================================================
// Mock Implementation for Testing
// =============================================================================

/// Mock chain oracle serving a fixed block table and logging every call.
#[derive(Default)]
pub struct MockBlockOracle {
    blocks: HashMap<BlockNumber, BlockHash>,
    latest: Option<BlockNumber>,
    calls: Mutex<Vec<BlockRequest>>,
    should_fail: AtomicBool,
}

impl MockBlockOracle {
    /// Empty oracle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known block.
    pub fn with_block(mut self, number: u64, hash: &str) -> Self {
        self.blocks.insert(BlockNumber(number), BlockHash::new(hash));
        self
    }

    /// Add a known block and make it the chain head.
    pub fn with_latest(mut self, number: u64, hash: &str) -> Self {
        self.blocks.insert(BlockNumber(number), BlockHash::new(hash));
        self.latest = Some(BlockNumber(number));
        self
    }

    /// Make every following call fail with a transport error (or stop failing).
    pub fn set_failing(&self, failing: bool) {
        self.should_fail.store(failing, Ordering::SeqCst);
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<BlockRequest> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls received for one block number.
    pub fn calls_for(&self, number: u64) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|request| **request == BlockRequest::Number(BlockNumber(number)))
            .count()
    }

    fn record(&self, request: BlockRequest) -> Result<(), OracleError> {
        self.calls.lock().push(request);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(OracleError::Transport("Mock failure".to_string()));
        }
        Ok(())
    }
}

impl BlockOracle for MockBlockOracle {
    fn block_by_number(&self, number: BlockNumber) -> Result<BlockInfo, OracleError> {
        self.record(BlockRequest::Number(number))?;
        let hash = self
            .blocks
            .get(&number)
            .cloned()
            .ok_or(OracleError::BlockNotFound(number.0))?;
        Ok(BlockInfo { number, hash })
    }

    fn latest_block(&self) -> Result<BlockInfo, OracleError> {
        self.record(BlockRequest::Latest)?;
        let number = self
            .latest
            .ok_or_else(|| OracleError::Transport("no chain head configured".to_string()))?;
        let hash = self
            .blocks
            .get(&number)
            .cloned()
            .ok_or(OracleError::BlockNotFound(number.0))?;
        Ok(BlockInfo { number, hash })
    }
}
