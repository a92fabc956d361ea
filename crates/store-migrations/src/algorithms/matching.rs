//! # Content Matching
//!
//! Pending-transaction fragments inside snapshots are copies of contract-send
//! event payloads that kept no event identifier. They are tied back to their
//! event by content.
//!
//! ## Projection
//!
//! The canonical projection of an upgraded event is its payload object with
//! exactly `triggered_by_block_hash` removed. Every other field participates
//! and is compared with JSON structural equality. Object key order does not
//! matter; array order and the number/string distinction do.

use crate::domain::{
    is_contract_send, BlockHash, EventId, EventRecord, MigrationError, Payload, RecordRef,
    TRIGGERED_BY_BLOCK_HASH_FIELD,
};
use serde_json::{Map, Value};

/// An upgraded contract-send event reduced to what matching needs.
#[derive(Clone, Debug)]
pub struct IndexedEvent {
    /// Event row.
    pub identifier: EventId,
    /// Payload without `triggered_by_block_hash`.
    pub projection: Map<String, Value>,
    /// The event's trigger hash.
    pub triggered_by: BlockHash,
}

/// All upgraded contract-send events of the store.
#[derive(Debug, Default)]
pub struct AugmentedEventIndex {
    events: Vec<IndexedEvent>,
}

impl AugmentedEventIndex {
    /// Index the contract-send events of `records`.
    ///
    /// Every contract-send event must already carry its trigger hash; one
    /// without it means the event phase did not complete.
    pub fn build(records: &[EventRecord]) -> Result<Self, MigrationError> {
        let mut events = Vec::new();
        for record in records {
            let at = RecordRef::Event(record.identifier);
            let payload = Payload::parse(&record.data).map_err(|e| e.at(at))?;
            if !is_contract_send(payload.type_tag().map_err(|e| e.at(at))?) {
                continue;
            }

            let triggered_by = payload
                .hash_field(TRIGGERED_BY_BLOCK_HASH_FIELD)
                .map_err(|e| e.at(at))?
                .ok_or_else(|| {
                    MigrationError::invalid(
                        at,
                        "contract-send event has no `triggered_by_block_hash`; \
                         events must be upgraded before snapshots",
                    )
                })?;

            events.push(IndexedEvent {
                identifier: record.identifier,
                projection: payload.without(TRIGGERED_BY_BLOCK_HASH_FIELD),
                triggered_by,
            });
        }
        Ok(Self { events })
    }

    /// Events whose projection equals `fragment`.
    pub fn matches<'a>(
        &'a self,
        fragment: &'a Map<String, Value>,
    ) -> impl Iterator<Item = &'a IndexedEvent> + 'a {
        self.events
            .iter()
            .filter(move |event| event.projection == *fragment)
    }

    /// Number of indexed events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether no event was indexed.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
