//! # Migration Service
//!
//! The v18 → v19 upgrade step: back-fills block hashes into state changes,
//! events and snapshots.
//!
//! One [`BlockHashResolver`] is shared by the three phases, so every distinct
//! block number costs at most one oracle round trip per run. The store is
//! written phase by phase; the version is stamped by the caller only after
//! the whole step returned `Ok`.

use super::resolver::BlockHashResolver;
use crate::algorithms::{
    add_block_hash_to_events, add_block_hash_to_snapshots, add_block_hash_to_state_changes,
};
use crate::config::MigrationConfig;
use crate::domain::{
    MigrationError, MigrationOutcome, MigrationReport, SOURCE_VERSION, TARGET_VERSION,
};
use crate::ports::{BlockOracle, MigrationApi, RecordStorage};
use tracing::{debug, info};

/// Run the upgrade step if `current_version` is the one it upgrades from.
///
/// Any other version is a no-op: the store and the oracle are left untouched
/// and the target version is returned.
pub fn upgrade<S, O>(
    storage: &mut S,
    oracle: &O,
    config: &MigrationConfig,
    current_version: u32,
) -> Result<MigrationOutcome, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    if current_version != SOURCE_VERSION {
        debug!(
            "[migrate] Store at version {}, block hash backfill does not apply",
            current_version
        );
        return Ok(MigrationOutcome {
            new_version: TARGET_VERSION,
            report: None,
        });
    }

    info!(
        "[migrate] Upgrading store from version {} to {}",
        SOURCE_VERSION, TARGET_VERSION
    );
    let mut resolver = BlockHashResolver::new(oracle);

    let state_changes = add_block_hash_to_state_changes(storage, &mut resolver, config)?;
    let events = add_block_hash_to_events(storage, &mut resolver, config)?;
    let snapshots = add_block_hash_to_snapshots(storage, &mut resolver, config)?;

    let report = MigrationReport {
        state_changes,
        events,
        snapshots: snapshots.phase,
        pending_transactions_resolved: snapshots.pending_transactions_resolved,
        resolver: resolver.stats(),
    };
    info!(
        "[migrate] Block hash backfill complete: {} oracle calls, {} cache hits",
        report.resolver.oracle_calls, report.resolver.cache_hits
    );

    Ok(MigrationOutcome {
        new_version: TARGET_VERSION,
        report: Some(report),
    })
}

/// Host-facing entry point of the step: returns only the version to stamp.
pub fn upgrade_v18_to_v19<S, O>(
    storage: &mut S,
    oracle: &O,
    config: &MigrationConfig,
    current_version: u32,
) -> Result<u32, MigrationError>
where
    S: RecordStorage + ?Sized,
    O: BlockOracle + ?Sized,
{
    upgrade(storage, oracle, config, current_version).map(|outcome| outcome.new_version)
}

/// Migration Service - the block hash backfill bound to an oracle.
pub struct MigrationService<O: BlockOracle> {
    config: MigrationConfig,
    oracle: O,
}

impl<O: BlockOracle> MigrationService<O> {
    /// Create a new service.
    pub fn new(config: MigrationConfig, oracle: O) -> Self {
        Self { config, oracle }
    }

    /// Get configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// The bound oracle.
    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O: BlockOracle> MigrationApi for MigrationService<O> {
    fn source_version(&self) -> u32 {
        SOURCE_VERSION
    }

    fn target_version(&self) -> u32 {
        TARGET_VERSION
    }

    fn run(
        &self,
        storage: &mut dyn RecordStorage,
        current_version: u32,
    ) -> Result<MigrationOutcome, MigrationError> {
        upgrade(storage, &self.oracle, &self.config, current_version)
    }
}
