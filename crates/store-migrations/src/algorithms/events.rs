//! # Event Augmentation
//!
//! Adds `triggered_by_block_hash` to every contract-send event. The hash comes
//! from the event's owning state change, so this phase must run after the
//! state changes were upgraded.
//!
//! ## Trigger Hash Derivation
//!
//! 1. The owning state change's `block_hash`, if it carries one.
//! 2. Otherwise the hash of its `block_number`, via the run cache.
//! 3. Otherwise the configured [`TriggerFallback`]: reject the run, or use the
//!    chain head.

use super::guard::{self, GuardDecision};
use super::log_progress;
use crate::application::BlockHashResolver;
use crate::config::MigrationConfig;
use crate::domain::{
    is_contract_send, BlockHash, EventId, EventRecord, MigrationError, Payload, PhaseReport,
    RecordRef, StateChangeId, TriggerFallback, BLOCK_HASH_FIELD, TRIGGERED_BY_BLOCK_HASH_FIELD,
};
use crate::ports::{BlockOracle, RecordStorage};
use tracing::{debug, info, warn};

/// Add `triggered_by_block_hash` to the contract-send events and persist them
/// in one batch.
pub fn add_block_hash_to_events<S, O>(
    storage: &mut S,
    resolver: &mut BlockHashResolver<'_, O>,
    config: &MigrationConfig,
) -> Result<PhaseReport, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    let records = storage.get_all_event_records()?;
    let mut report = PhaseReport {
        examined: records.len(),
        ..PhaseReport::default()
    };

    let mut qualifying: Vec<(EventRecord, Payload)> = Vec::new();
    let mut upgraded = Vec::new();
    for record in records {
        let at = RecordRef::Event(record.identifier);
        let payload = Payload::parse(&record.data).map_err(|e| e.at(at))?;
        if !is_contract_send(payload.type_tag().map_err(|e| e.at(at))?) {
            continue;
        }
        if payload.contains(TRIGGERED_BY_BLOCK_HASH_FIELD) {
            upgraded.push(at);
        }
        qualifying.push((record, payload));
    }
    report.qualifying = qualifying.len();

    if guard::check(
        config.phase_guard,
        TRIGGERED_BY_BLOCK_HASH_FIELD,
        qualifying.len(),
        &upgraded,
    )? == GuardDecision::AlreadyUpgraded
    {
        info!(
            "[migrate] Events already carry trigger hashes ({} records), skipping",
            qualifying.len()
        );
        report.already_upgraded = qualifying.len();
        return Ok(report);
    }

    let total = qualifying.len();
    let mut batch = Vec::with_capacity(total);
    for (done, (record, mut payload)) in qualifying.into_iter().enumerate() {
        let block_hash = trigger_block_hash(
            &*storage,
            resolver,
            config.trigger_fallback,
            record.identifier,
            record.state_change_identifier,
        )?;
        payload.set_hash(TRIGGERED_BY_BLOCK_HASH_FIELD, &block_hash);
        debug!(
            "[migrate] {} triggered by {} ({})",
            record.identifier, record.state_change_identifier, block_hash
        );

        batch.push(EventRecord {
            data: payload
                .to_json()
                .map_err(|e| e.at(RecordRef::Event(record.identifier)))?,
            ..record
        });
        log_progress("events", done + 1, total, config.log_progress_every);
    }

    report.updated = batch.len();
    if !batch.is_empty() {
        storage.update_events(batch)?;
    }

    info!(
        "[migrate] Added triggered_by_block_hash to {} of {} events",
        report.updated, report.examined
    );
    Ok(report)
}

/// Derive the trigger hash of one event from its owning state change.
fn trigger_block_hash<S, O>(
    storage: &S,
    resolver: &mut BlockHashResolver<'_, O>,
    fallback: TriggerFallback,
    event_id: EventId,
    state_change_id: StateChangeId,
) -> Result<BlockHash, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    let mut matched = storage.get_state_changes_by_identifier(state_change_id, state_change_id)?;
    if matched.len() != 1 {
        return Err(MigrationError::MissingReference {
            event_id,
            state_change_id,
            matches: matched.len(),
        });
    }

    let at = RecordRef::StateChange(state_change_id);
    let owner = Payload::parse(&matched.remove(0)).map_err(|e| e.at(at))?;

    if let Some(hash) = owner.hash_field(BLOCK_HASH_FIELD).map_err(|e| e.at(at))? {
        return Ok(hash);
    }
    if let Some(number) = owner.block_number().map_err(|e| e.at(at))? {
        return resolver.resolve(number);
    }

    match fallback {
        TriggerFallback::Reject => Err(MigrationError::UnresolvableTriggerBlock {
            event_id,
            state_change_id,
        }),
        TriggerFallback::LatestBlock => {
            warn!(
                "[migrate] {} has no block reference, using chain head for {}",
                state_change_id, event_id
            );
            resolver.resolve_latest()
        }
    }
}
