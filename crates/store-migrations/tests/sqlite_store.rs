//! # SQLite Store Upgrade
//!
//! Runs the upgrade driver against an on-disk SQLite database.

#![cfg(feature = "sqlite")]

use serde_json::{json, Value};
use store_migrations::{
    EventId, MigrationConfig, MigrationError, MockBlockOracle, RecordStorage, SnapshotId,
    SqliteRecordStorage, StateChangeId, UpgradeDriver,
};
use tempfile::TempDir;

const CHANNEL_CLOSED: &str = "raiden.transfer.state_change.ContractReceiveChannelClosed";
const SEND_SETTLE: &str = "raiden.transfer.events.ContractSendChannelSettle";

fn seed(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("node.db");
    let mut store = SqliteRecordStorage::open(&path).unwrap();
    store
        .insert_state_change(
            StateChangeId(1),
            &json!({"_type": CHANNEL_CLOSED, "block_number": 7}).to_string(),
        )
        .unwrap();
    store
        .insert_event(
            EventId(1),
            StateChangeId(1),
            &json!({"_type": SEND_SETTLE, "channel": 3}).to_string(),
        )
        .unwrap();
    store
        .insert_snapshot(
            SnapshotId(1),
            StateChangeId(1),
            &json!({
                "block_number": 7,
                "pending_transactions": [{"_type": SEND_SETTLE, "channel": 3}]
            })
            .to_string(),
        )
        .unwrap();
    store.write_version(18).unwrap();
    path
}

#[test]
fn test_upgrade_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = seed(&dir);
    let oracle = MockBlockOracle::new().with_block(7, "0x07");

    {
        let mut store = SqliteRecordStorage::open(&path).unwrap();
        let driver = UpgradeDriver::new(MigrationConfig::for_testing());
        assert_eq!(driver.upgrade(&mut store, &oracle).unwrap(), 19);
    }

    let store = SqliteRecordStorage::open(&path).unwrap();
    assert_eq!(store.read_version().unwrap(), Some(19));

    let state_change: Value =
        serde_json::from_str(&store.get_all_state_changes().unwrap()[0].data).unwrap();
    assert_eq!(state_change["block_hash"], "0x07");

    let event: Value =
        serde_json::from_str(&store.get_all_event_records().unwrap()[0].data).unwrap();
    assert_eq!(event["triggered_by_block_hash"], "0x07");

    let snapshot: Value = serde_json::from_str(&store.get_snapshots().unwrap()[0].data).unwrap();
    assert_eq!(snapshot["block_hash"], "0x07");
    assert_eq!(
        snapshot["pending_transactions"][0]["triggered_by_block_hash"],
        "0x07"
    );
    assert_eq!(oracle.call_count(), 1);
}

#[test]
fn test_failed_upgrade_leaves_version() {
    let dir = TempDir::new().unwrap();
    let path = seed(&dir);
    let oracle = MockBlockOracle::new();

    let mut store = SqliteRecordStorage::open(&path).unwrap();
    let err = UpgradeDriver::new(MigrationConfig::for_testing())
        .upgrade(&mut store, &oracle)
        .unwrap_err();

    assert!(matches!(err, MigrationError::OracleUnavailable { .. }));
    assert_eq!(store.read_version().unwrap(), Some(18));
}

#[test]
fn test_unversioned_populated_store_is_not_stamped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("node.db");
    let mut store = SqliteRecordStorage::open(&path).unwrap();
    store
        .insert_state_change(
            StateChangeId(1),
            &json!({"_type": CHANNEL_CLOSED, "block_number": 7}).to_string(),
        )
        .unwrap();
    let oracle = MockBlockOracle::new().with_block(7, "0x07");

    let err = UpgradeDriver::new(MigrationConfig::for_testing())
        .upgrade(&mut store, &oracle)
        .unwrap_err();

    assert!(matches!(err, MigrationError::NoUpgradePath { from: 0, to: 19 }));
    assert_eq!(store.read_version().unwrap(), None);
    let state_change: Value =
        serde_json::from_str(&store.get_all_state_changes().unwrap()[0].data).unwrap();
    assert!(state_change.get("block_hash").is_none());
}
