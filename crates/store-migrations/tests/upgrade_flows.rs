//! # Block Hash Backfill Flows
//!
//! End-to-end runs of the v18 → v19 step over the in-memory store.
//!
//! ## Test Categories
//!
//! 1. **Happy path** - every record kind upgraded, oracle called once per block
//! 2. **No-op runs** - other versions touch neither store nor oracle
//! 3. **Fatal data** - dangling references, unmatched pending transactions
//! 4. **Resumption** - rerunning a half-finished step under each guard

use serde_json::{json, Value};
use store_migrations::{
    upgrade, upgrade_v18_to_v19, InMemoryRecordStorage, MigrationApi, MigrationConfig,
    MigrationError, MigrationService, MockBlockOracle, PhaseGuard, RecordStorage, StateChangeId,
    UpgradeDriver,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

const CHANNEL_NEW: &str = "raiden.transfer.state_change.ContractReceiveChannelNew";
const CHANNEL_CLOSED: &str = "raiden.transfer.state_change.ContractReceiveChannelClosed";
const INIT_CHAIN: &str = "raiden.transfer.state_change.ActionInitChain";
const TRANSFER_DIRECT: &str = "raiden.transfer.state_change.ActionTransferDirect";
const SEND_SETTLE: &str = "raiden.transfer.events.ContractSendChannelSettle";
const SEND_CLOSE: &str = "raiden.transfer.events.ContractSendChannelClose";
const SECRET_REVEAL: &str = "raiden.transfer.events.SendSecretReveal";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn parse(data: &str) -> Value {
    serde_json::from_str(data).unwrap()
}

/// A small v18 store: chain init at block 10, two channels opened at 10
/// and 11, a close at 12 with its settle event, and a snapshot at 12 holding
/// the settle as pending transaction.
fn v18_store() -> InMemoryRecordStorage {
    let mut storage = InMemoryRecordStorage::new().with_version(18);
    storage.insert_state_change(json!({"_type": INIT_CHAIN, "block_number": "10"}));
    storage.insert_state_change(json!({"_type": CHANNEL_NEW, "block_number": 10, "channel": 1}));
    storage.insert_state_change(json!({"_type": CHANNEL_NEW, "block_number": 11, "channel": 2}));
    storage.insert_state_change(json!({"_type": TRANSFER_DIRECT, "amount": 5}));
    let closed = storage.insert_state_change(json!({
        "_type": CHANNEL_CLOSED,
        "block_number": 12,
        "channel": 1
    }));
    storage.insert_event(closed, json!({"_type": SEND_SETTLE, "channel": 1}));
    storage.insert_event(closed, json!({"_type": SECRET_REVEAL, "secret": "0x01"}));
    storage.insert_snapshot(
        closed,
        json!({
            "block_number": 12,
            "pending_transactions": [{"_type": SEND_SETTLE, "channel": 1}]
        }),
    );
    storage
}

fn v18_oracle() -> MockBlockOracle {
    MockBlockOracle::new()
        .with_block(10, "0x0a")
        .with_block(11, "0x0b")
        .with_block(12, "0x0c")
}

// =============================================================================
// HAPPY PATH
// =============================================================================

#[test]
fn test_single_state_change_gets_hash() {
    init_tracing();
    let mut storage = InMemoryRecordStorage::new();
    storage.insert_state_change(json!({"_type": CHANNEL_NEW, "block_number": 5}));
    let oracle = MockBlockOracle::new().with_block(5, "0xabc");

    let version =
        upgrade_v18_to_v19(&mut storage, &oracle, &MigrationConfig::for_testing(), 18).unwrap();

    assert_eq!(version, 19);
    let stored = parse(&storage.state_changes()[0].data);
    assert_eq!(stored["block_hash"], "0xabc");
    assert_eq!(stored["block_number"], 5);
    assert_eq!(oracle.call_count(), 1);
}

#[test]
fn test_full_store_upgrade() {
    init_tracing();
    let mut storage = v18_store();
    let oracle = v18_oracle();

    let outcome = upgrade(&mut storage, &oracle, &MigrationConfig::for_testing(), 18).unwrap();
    let report = outcome.report.unwrap();

    assert_eq!(report.state_changes.examined, 5);
    assert_eq!(report.state_changes.updated, 4);
    assert_eq!(report.events.updated, 1);
    assert_eq!(report.snapshots.updated, 1);
    // Blocks 10, 10, 11, 12, 12: three distinct numbers.
    assert_eq!(oracle.calls_for(10), 1);
    assert_eq!(oracle.calls_for(11), 1);
    assert_eq!(oracle.calls_for(12), 1);
    assert_eq!(oracle.call_count(), 3);

    let state_changes = storage.state_changes();
    assert_eq!(parse(&state_changes[0].data)["block_hash"], "0x0a");
    assert_eq!(parse(&state_changes[2].data)["block_hash"], "0x0b");
    assert!(parse(&state_changes[3].data).get("block_hash").is_none());

    let events = storage.events();
    assert_eq!(parse(&events[0].data)["triggered_by_block_hash"], "0x0c");
    assert!(parse(&events[1].data).get("triggered_by_block_hash").is_none());

    let snapshot = parse(&storage.snapshots()[0].data);
    assert_eq!(snapshot["block_hash"], "0x0c");
    assert_eq!(
        snapshot["pending_transactions"][0]["triggered_by_block_hash"],
        "0x0c"
    );
}

#[test]
fn test_driver_stamps_version_after_step() {
    init_tracing();
    let mut storage = v18_store();
    let oracle = v18_oracle();
    let driver = UpgradeDriver::new(MigrationConfig::for_testing());

    assert_eq!(driver.upgrade(&mut storage, &oracle).unwrap(), 19);
    assert_eq!(storage.read_version().unwrap(), Some(19));

    // A second start finds nothing to do.
    let writes = storage.write_count();
    assert_eq!(driver.upgrade(&mut storage, &oracle).unwrap(), 19);
    assert_eq!(storage.write_count(), writes);
    assert_eq!(oracle.call_count(), 3);
}

// =============================================================================
// NO-OP RUNS
// =============================================================================

#[test]
fn test_other_version_touches_nothing() {
    let service = MigrationService::new(MigrationConfig::for_testing(), v18_oracle());
    let mut storage = v18_store();
    let before = storage.state_changes();

    let outcome = service.run(&mut storage, 17).unwrap();

    assert_eq!(outcome.new_version, 19);
    assert!(!outcome.ran());
    assert_eq!(storage.write_count(), 0);
    assert_eq!(storage.state_changes(), before);
    assert_eq!(service.oracle().call_count(), 0);
}

// =============================================================================
// FATAL DATA
// =============================================================================

#[test]
fn test_dangling_event_reference_aborts_before_event_writes() {
    let mut storage = InMemoryRecordStorage::new();
    storage.insert_state_change(json!({"_type": CHANNEL_NEW, "block_number": 5}));
    storage.insert_event(StateChangeId(42), json!({"_type": SEND_CLOSE}));
    let oracle = MockBlockOracle::new().with_block(5, "0xabc");

    let err =
        upgrade_v18_to_v19(&mut storage, &oracle, &MigrationConfig::for_testing(), 18).unwrap_err();

    assert!(matches!(
        err,
        MigrationError::MissingReference {
            state_change_id: StateChangeId(42),
            matches: 0,
            ..
        }
    ));
    assert!(parse(&storage.events()[0].data)
        .get("triggered_by_block_hash")
        .is_none());
}

#[test]
fn test_duplicate_state_change_identifier() {
    let mut storage = InMemoryRecordStorage::new();
    storage.insert_state_change_with_id(StateChangeId(3), r#"{"_type":"x.Block"}"#);
    storage.insert_state_change_with_id(StateChangeId(3), r#"{"_type":"x.Block"}"#);
    storage.insert_event(StateChangeId(3), json!({"_type": SEND_CLOSE}));

    let err = upgrade_v18_to_v19(
        &mut storage,
        &MockBlockOracle::new(),
        &MigrationConfig::for_testing(),
        18,
    )
    .unwrap_err();

    assert!(matches!(err, MigrationError::MissingReference { matches: 2, .. }));
}

#[test]
fn test_orphan_pending_transaction() {
    let mut storage = v18_store();
    storage.insert_snapshot(
        StateChangeId(5),
        json!({
            "block_number": 12,
            "pending_transactions": [{"_type": SEND_CLOSE, "channel": 77}]
        }),
    );

    let err = upgrade_v18_to_v19(&mut storage, &v18_oracle(), &MigrationConfig::for_testing(), 18)
        .unwrap_err();

    assert!(matches!(
        err,
        MigrationError::UnresolvedPendingTransaction {
            fragment_index: 0,
            matches: 0,
            ..
        }
    ));
    assert!(!err.is_retryable());
}

#[test]
fn test_oracle_outage_is_retryable_and_rerun_succeeds() {
    let mut storage = v18_store();
    let oracle = v18_oracle();
    oracle.set_failing(true);
    let driver = UpgradeDriver::new(MigrationConfig::for_testing());

    let err = driver.upgrade(&mut storage, &oracle).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(storage.read_version().unwrap(), Some(18));
    assert_eq!(storage.write_count(), 0);

    oracle.set_failing(false);
    assert_eq!(driver.upgrade(&mut storage, &oracle).unwrap(), 19);
}

// =============================================================================
// RESUMPTION
// =============================================================================

/// A store whose state changes and events were upgraded by a run that then
/// crashed before the snapshot was written.
fn half_upgraded_store() -> InMemoryRecordStorage {
    let mut storage = v18_store();
    let oracle = v18_oracle();
    let config = MigrationConfig::for_testing();
    let mut resolver = store_migrations::BlockHashResolver::new(&oracle);
    store_migrations::add_block_hash_to_state_changes(&mut storage, &mut resolver, &config)
        .unwrap();
    store_migrations::add_block_hash_to_events(&mut storage, &mut resolver, &config).unwrap();
    storage
}

#[test]
fn test_strict_rerun_rejects_half_upgraded_store() {
    let mut storage = half_upgraded_store();

    let err = upgrade_v18_to_v19(&mut storage, &v18_oracle(), &MigrationConfig::for_testing(), 18)
        .unwrap_err();

    assert!(matches!(err, MigrationError::InvalidPersistedData { .. }));
    assert!(err.to_string().contains("block_hash"));
}

#[test]
fn test_resumable_rerun_finishes_half_upgraded_store() {
    let mut storage = half_upgraded_store();
    let oracle = v18_oracle();
    let config = MigrationConfig {
        phase_guard: PhaseGuard::Resumable,
        ..MigrationConfig::for_testing()
    };

    let outcome = upgrade(&mut storage, &oracle, &config, 18).unwrap();
    let report = outcome.report.unwrap();

    assert_eq!(report.state_changes.already_upgraded, 4);
    assert_eq!(report.events.already_upgraded, 1);
    assert_eq!(report.snapshots.updated, 1);
    assert_eq!(oracle.call_count(), 1);
    let snapshot = parse(&storage.snapshots()[0].data);
    assert_eq!(
        snapshot["pending_transactions"][0]["triggered_by_block_hash"],
        "0x0c"
    );
}

#[test]
fn test_config_from_toml() {
    let config = MigrationConfig::from_toml_str(
        r#"
        phase_guard = "resumable"
        trigger_fallback = "latest_block"
        "#,
    )
    .unwrap();
    assert_eq!(config.phase_guard, PhaseGuard::Resumable);
    assert_eq!(config.log_progress_every, MigrationConfig::default().log_progress_every);
}
