//! # Value Objects
//!
//! Identifiers, chain references and the policy knobs of an upgrade run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store version the block-hash backfill upgrades from.
pub const SOURCE_VERSION: u32 = 18;

/// Store version the block-hash backfill produces.
pub const TARGET_VERSION: u32 = 19;

/// Identifier of a persisted state change (totally ordered by creation).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateChangeId(pub u64);

/// Identifier of a persisted event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

/// Identifier of a persisted snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub u64);

impl fmt::Display for StateChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "state_change#{}", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event#{}", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "snapshot#{}", self.0)
    }
}

/// Index of a block in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(pub u64);

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content identifier of a block, kept in the textual form the store persists
/// (`0x`-prefixed hex as returned by the chain oracle).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    /// Wrap an oracle-provided hash string.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    /// The persisted textual form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(hash: &str) -> Self {
        Self::new(hash)
    }
}

/// A block as reported by the chain oracle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block number.
    pub number: BlockNumber,
    /// Block hash.
    pub hash: BlockHash,
}

/// Which block an oracle request was about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockRequest {
    /// A specific block number.
    Number(BlockNumber),
    /// The chain head at the time of the call.
    Latest,
}

impl fmt::Display for BlockRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRequest::Number(number) => write!(f, "block {}", number),
            BlockRequest::Latest => f.write_str("latest block"),
        }
    }
}

/// How a phase treats records that already carry the derived field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseGuard {
    /// Any qualifying record that already carries the field aborts the run.
    #[default]
    Strict,
    /// A fully upgraded phase (or snapshot) is skipped; a partially upgraded
    /// one still aborts the run.
    Resumable,
}

/// What an event's trigger hash becomes when its state change carries neither
/// a block hash nor a block number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerFallback {
    /// Abort the run with `UnresolvableTriggerBlock`.
    #[default]
    Reject,
    /// Use the hash of the chain head, fetched once per run.
    LatestBlock,
}
