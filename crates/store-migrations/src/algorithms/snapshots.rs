//! # Snapshot Augmentation
//!
//! Adds `block_hash` to every snapshot and `triggered_by_block_hash` to its
//! contract-send pending transactions.
//!
//! Fragments carry no event identifier, so each one is resolved by content
//! against the upgraded events (see [`super::matching`]). That makes this the
//! last phase: it reads trigger hashes the event phase wrote. The scan is
//! snapshots × fragments × events, which is fine for a one-off offline upgrade.
//!
//! Snapshots are written one at a time, so the version guard applies per
//! snapshot.

use super::guard::{self, GuardDecision};
use super::log_progress;
use super::matching::AugmentedEventIndex;
use crate::application::BlockHashResolver;
use crate::config::MigrationConfig;
use crate::domain::{
    is_contract_send, MigrationError, Payload, PhaseReport, RecordRef, SnapshotRecord,
    BLOCK_HASH_FIELD, TRIGGERED_BY_BLOCK_HASH_FIELD,
};
use crate::ports::{BlockOracle, RecordStorage};
use serde_json::Value;
use tracing::{debug, info};

/// Counters of the snapshot phase.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SnapshotPhaseReport {
    /// Snapshot counters.
    pub phase: PhaseReport,
    /// Pending transactions that received a trigger hash.
    pub pending_transactions_resolved: usize,
}

/// Upgrade every snapshot, persisting each one individually.
pub fn add_block_hash_to_snapshots<S, O>(
    storage: &mut S,
    resolver: &mut BlockHashResolver<'_, O>,
    config: &MigrationConfig,
) -> Result<SnapshotPhaseReport, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    let snapshots = storage.get_snapshots()?;
    let mut report = SnapshotPhaseReport {
        phase: PhaseReport {
            examined: snapshots.len(),
            qualifying: snapshots.len(),
            ..PhaseReport::default()
        },
        ..SnapshotPhaseReport::default()
    };
    if snapshots.is_empty() {
        info!("[migrate] No snapshots to upgrade");
        return Ok(report);
    }

    let index = AugmentedEventIndex::build(&storage.get_all_event_records()?)?;
    debug!("[migrate] Indexed {} upgraded contract-send events", index.len());

    let total = snapshots.len();
    for (done, snapshot) in snapshots.into_iter().enumerate() {
        let identifier = snapshot.identifier;
        match transform_snapshot(snapshot, &index, resolver, config)? {
            Transformed::AlreadyUpgraded => {
                debug!("[migrate] {} already upgraded, skipping", identifier);
                report.phase.already_upgraded += 1;
            }
            Transformed::Upgraded { data, resolved } => {
                storage.update_snapshot(identifier, data)?;
                report.phase.updated += 1;
                report.pending_transactions_resolved += resolved;
            }
        }
        log_progress("snapshots", done + 1, total, config.log_progress_every);
    }

    info!(
        "[migrate] Upgraded {} of {} snapshots ({} pending transactions resolved)",
        report.phase.updated, report.phase.examined, report.pending_transactions_resolved
    );
    Ok(report)
}

enum Transformed {
    AlreadyUpgraded,
    Upgraded { data: String, resolved: usize },
}

fn transform_snapshot<O>(
    snapshot: SnapshotRecord,
    events: &AugmentedEventIndex,
    resolver: &mut BlockHashResolver<'_, O>,
    config: &MigrationConfig,
) -> Result<Transformed, MigrationError>
where
    O: BlockOracle + ?Sized,
{
    let snapshot_id = snapshot.identifier;
    let at = RecordRef::Snapshot(snapshot_id);
    let mut payload = Payload::parse(&snapshot.data).map_err(|e| e.at(at))?;
    let block_number = payload.require_block_number().map_err(|e| e.at(at))?;

    let mut qualifying = 1;
    let mut upgraded = Vec::new();
    if payload.contains(BLOCK_HASH_FIELD) {
        upgraded.push(at);
    }

    let raw_fragments = payload.pending_transactions().map_err(|e| e.at(at))?.to_vec();
    let mut fragments = Vec::with_capacity(raw_fragments.len());
    for (position, raw) in raw_fragments.into_iter().enumerate() {
        let fragment_at = RecordRef::PendingTransaction {
            snapshot: snapshot_id,
            index: position,
        };
        let fragment = Payload::from_value(raw).map_err(|e| e.at(fragment_at))?;
        let type_tag = fragment.type_tag().map_err(|e| e.at(fragment_at))?;
        let contract_send = is_contract_send(type_tag);
        if contract_send {
            qualifying += 1;
            if fragment.contains(TRIGGERED_BY_BLOCK_HASH_FIELD) {
                upgraded.push(fragment_at);
            }
        }
        fragments.push((fragment, contract_send));
    }

    let field = match upgraded.first() {
        Some(RecordRef::PendingTransaction { .. }) => TRIGGERED_BY_BLOCK_HASH_FIELD,
        _ => BLOCK_HASH_FIELD,
    };
    if guard::check(config.phase_guard, field, qualifying, &upgraded)?
        == GuardDecision::AlreadyUpgraded
    {
        return Ok(Transformed::AlreadyUpgraded);
    }

    let block_hash = resolver.resolve(block_number)?;

    let mut resolved = 0;
    let mut pending: Vec<Value> = Vec::with_capacity(fragments.len());
    for (fragment_index, (mut fragment, contract_send)) in fragments.into_iter().enumerate() {
        if !contract_send {
            pending.push(fragment.into_value());
            continue;
        }

        let triggered_by = {
            let mut found = events.matches(fragment.fields());
            match (found.next(), found.next()) {
                (Some(event), None) => event.triggered_by.clone(),
                (first, second) => {
                    let matches = usize::from(first.is_some())
                        + usize::from(second.is_some())
                        + found.count();
                    return Err(MigrationError::UnresolvedPendingTransaction {
                        snapshot_id,
                        fragment_index,
                        matches,
                    });
                }
            }
        };

        fragment.set_hash(TRIGGERED_BY_BLOCK_HASH_FIELD, &triggered_by);
        pending.push(fragment.into_value());
        resolved += 1;
    }

    payload.set_hash(BLOCK_HASH_FIELD, &block_hash);
    payload.set_pending_transactions(pending);
    let data = payload.to_json().map_err(|e| e.at(at))?;
    Ok(Transformed::Upgraded { data, resolved })
}
