//! # State Change Augmentation
//!
//! Adds `block_hash` to every block-bound state change (contract receipts and
//! chain initialization). Other state changes are never rewritten.

use super::guard::{self, GuardDecision};
use super::log_progress;
use crate::application::BlockHashResolver;
use crate::config::MigrationConfig;
use crate::domain::{
    is_block_bound_state_change, MigrationError, Payload, PhaseReport, RecordRef,
    StateChangeId, StateChangeRecord, BLOCK_HASH_FIELD,
};
use crate::ports::{BlockOracle, RecordStorage};
use tracing::{debug, info};

/// Add `block_hash` to the qualifying state changes and persist them in one
/// batch.
pub fn add_block_hash_to_state_changes<S, O>(
    storage: &mut S,
    resolver: &mut BlockHashResolver<'_, O>,
    config: &MigrationConfig,
) -> Result<PhaseReport, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    let records = storage.get_all_state_changes()?;
    let mut report = PhaseReport {
        examined: records.len(),
        ..PhaseReport::default()
    };

    let mut qualifying: Vec<(StateChangeId, Payload)> = Vec::new();
    let mut upgraded = Vec::new();
    for record in records {
        let at = RecordRef::StateChange(record.identifier);
        let payload = Payload::parse(&record.data).map_err(|e| e.at(at))?;
        if !is_block_bound_state_change(payload.type_tag().map_err(|e| e.at(at))?) {
            continue;
        }
        if payload.contains(BLOCK_HASH_FIELD) {
            upgraded.push(at);
        }
        qualifying.push((record.identifier, payload));
    }
    report.qualifying = qualifying.len();

    if guard::check(config.phase_guard, BLOCK_HASH_FIELD, qualifying.len(), &upgraded)?
        == GuardDecision::AlreadyUpgraded
    {
        info!(
            "[migrate] State changes already carry block hashes ({} records), skipping",
            qualifying.len()
        );
        report.already_upgraded = qualifying.len();
        return Ok(report);
    }

    let total = qualifying.len();
    let mut batch = Vec::with_capacity(total);
    for (done, (identifier, mut payload)) in qualifying.into_iter().enumerate() {
        let at = RecordRef::StateChange(identifier);
        let block_number = payload.require_block_number().map_err(|e| e.at(at))?;
        let block_hash = resolver.resolve(block_number)?;
        payload.set_hash(BLOCK_HASH_FIELD, &block_hash);
        debug!("[migrate] {} -> block {} ({})", identifier, block_number, block_hash);

        batch.push(StateChangeRecord {
            identifier,
            data: payload.to_json().map_err(|e| e.at(at))?,
        });
        log_progress("state changes", done + 1, total, config.log_progress_every);
    }

    report.updated = batch.len();
    if !batch.is_empty() {
        storage.update_state_changes(batch)?;
    }

    info!(
        "[migrate] Added block_hash to {} of {} state changes",
        report.updated, report.examined
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryRecordStorage;
    use crate::domain::PhaseGuard;
    use crate::ports::MockBlockOracle;
    use serde_json::{json, Value};

    const RECEIVE: &str = "app.transfer.state_change.ContractReceiveChannelNew";
    const INIT: &str = "app.transfer.state_change.ActionInitChain";
    const DIRECT: &str = "app.transfer.state_change.ActionTransferDirect";

    fn run(
        storage: &mut InMemoryRecordStorage,
        oracle: &MockBlockOracle,
    ) -> Result<PhaseReport, MigrationError> {
        let mut resolver = BlockHashResolver::new(oracle);
        add_block_hash_to_state_changes(storage, &mut resolver, &MigrationConfig::for_testing())
    }

    fn stored(storage: &InMemoryRecordStorage, id: u64) -> Value {
        let record = storage
            .state_changes()
            .into_iter()
            .find(|r| r.identifier == StateChangeId(id))
            .unwrap();
        serde_json::from_str(&record.data).unwrap()
    }

    #[test]
    fn test_qualifying_records_get_oracle_hash() {
        let mut storage = InMemoryRecordStorage::new();
        storage.insert_state_change(json!({"_type": RECEIVE, "block_number": "10"}));
        storage.insert_state_change(json!({"_type": INIT, "block_number": 11}));
        storage.insert_state_change(json!({"_type": DIRECT, "amount": 3}));
        let oracle = MockBlockOracle::new()
            .with_block(10, "0x0a")
            .with_block(11, "0x0b");

        let report = run(&mut storage, &oracle).unwrap();

        assert_eq!(report.examined, 3);
        assert_eq!(report.updated, 2);
        assert_eq!(stored(&storage, 1)["block_hash"], "0x0a");
        assert_eq!(stored(&storage, 2)["block_hash"], "0x0b");
        assert_eq!(stored(&storage, 3), json!({"_type": DIRECT, "amount": 3}));
        assert_eq!(storage.write_count(), 1);
    }

    #[test]
    fn test_present_hash_is_invalid_data() {
        let mut storage = InMemoryRecordStorage::new();
        storage.insert_state_change(json!({"_type": RECEIVE, "block_number": 1}));
        storage.insert_state_change(
            json!({"_type": RECEIVE, "block_number": 2, "block_hash": "0x02"}),
        );
        let oracle = MockBlockOracle::new().with_block(1, "0x01");

        let err = run(&mut storage, &oracle).unwrap_err();

        assert!(matches!(
            err,
            MigrationError::InvalidPersistedData {
                record: RecordRef::StateChange(StateChangeId(2)),
                ..
            }
        ));
        assert_eq!(oracle.call_count(), 0);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_missing_block_number_is_invalid_data() {
        let mut storage = InMemoryRecordStorage::new();
        storage.insert_state_change(json!({"_type": RECEIVE}));
        let oracle = MockBlockOracle::new();

        let err = run(&mut storage, &oracle).unwrap_err();
        assert!(err.to_string().contains("block_number"));
    }

    #[test]
    fn test_resumable_skips_upgraded_phase() {
        let mut storage = InMemoryRecordStorage::new();
        storage.insert_state_change(
            json!({"_type": RECEIVE, "block_number": 2, "block_hash": "0x02"}),
        );
        let oracle = MockBlockOracle::new();
        let mut resolver = BlockHashResolver::new(&oracle);
        let config = MigrationConfig {
            phase_guard: PhaseGuard::Resumable,
            ..MigrationConfig::for_testing()
        };

        let report = add_block_hash_to_state_changes(&mut storage, &mut resolver, &config).unwrap();
        assert_eq!(report.already_upgraded, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_no_qualifying_records_writes_nothing() {
        let mut storage = InMemoryRecordStorage::new();
        storage.insert_state_change(json!({"_type": DIRECT}));
        let oracle = MockBlockOracle::new();

        let report = run(&mut storage, &oracle).unwrap();
        assert_eq!(report.qualifying, 0);
        assert_eq!(storage.write_count(), 0);
    }
}
