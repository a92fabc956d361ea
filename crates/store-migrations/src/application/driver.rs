//! # Upgrade Driver
//!
//! Walks the persisted store version forward through a chain of upgrade
//! steps. After each step returns, the new version is written immediately;
//! that write is the commit point of the step. A step that fails leaves the
//! version where it was, so the next start reruns it.

use super::service::upgrade_v18_to_v19;
use crate::config::MigrationConfig;
use crate::domain::{MigrationError, SOURCE_VERSION, TARGET_VERSION};
use crate::ports::{BlockOracle, RecordStorage};
use tracing::{debug, info};

/// Signature every upgrade step implements.
pub type StepFn = fn(
    &mut dyn RecordStorage,
    &dyn BlockOracle,
    &MigrationConfig,
    u32,
) -> Result<u32, MigrationError>;

/// One registered upgrade step.
#[derive(Clone, Copy)]
pub struct UpgradeStep {
    /// Version the step upgrades from.
    pub source_version: u32,
    /// Version the step produces.
    pub target_version: u32,
    /// Name used in log lines.
    pub name: &'static str,
    /// The step itself.
    pub run: StepFn,
}

impl std::fmt::Debug for UpgradeStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpgradeStep")
            .field("source_version", &self.source_version)
            .field("target_version", &self.target_version)
            .field("name", &self.name)
            .finish()
    }
}

fn run_block_hash_backfill(
    storage: &mut dyn RecordStorage,
    oracle: &dyn BlockOracle,
    config: &MigrationConfig,
    current_version: u32,
) -> Result<u32, MigrationError> {
    upgrade_v18_to_v19(storage, oracle, config, current_version)
}

/// The block hash backfill registered as a driver step.
pub fn block_hash_backfill_step() -> UpgradeStep {
    UpgradeStep {
        source_version: SOURCE_VERSION,
        target_version: TARGET_VERSION,
        name: "block_hash_backfill",
        run: run_block_hash_backfill,
    }
}

/// Runs the registered steps against a store.
#[derive(Debug)]
pub struct UpgradeDriver {
    config: MigrationConfig,
    steps: Vec<UpgradeStep>,
}

impl UpgradeDriver {
    /// Driver with every step this crate ships.
    pub fn new(config: MigrationConfig) -> Self {
        Self {
            config,
            steps: vec![block_hash_backfill_step()],
        }
    }

    /// Driver over a custom chain of steps.
    ///
    /// Steps must be given in order, each one moving the version forward and
    /// starting where the previous one ended. An empty chain leads nowhere
    /// and is rejected as well.
    pub fn with_steps(
        config: MigrationConfig,
        steps: Vec<UpgradeStep>,
    ) -> Result<Self, MigrationError> {
        let Some(first) = steps.first() else {
            return Err(MigrationError::NoUpgradePath { from: 0, to: 0 });
        };

        let mut version = first.source_version;
        for step in &steps {
            if step.source_version != version || step.target_version <= step.source_version {
                return Err(MigrationError::NoUpgradePath {
                    from: version,
                    to: step.target_version,
                });
            }
            version = step.target_version;
        }

        Ok(Self { config, steps })
    }

    /// Oldest version the chain can upgrade from.
    pub fn oldest_version(&self) -> u32 {
        self.steps
            .first()
            .map(|step| step.source_version)
            .unwrap_or(TARGET_VERSION)
    }

    /// Version a store ends up at after a successful upgrade.
    pub fn latest_version(&self) -> u32 {
        self.steps
            .last()
            .map(|step| step.target_version)
            .unwrap_or(TARGET_VERSION)
    }

    /// Bring `storage` to [`latest_version`](Self::latest_version).
    ///
    /// Returns the version the store is stamped with afterwards.
    pub fn upgrade(
        &self,
        storage: &mut dyn RecordStorage,
        oracle: &dyn BlockOracle,
    ) -> Result<u32, MigrationError> {
        let latest = self.latest_version();

        let Some(mut current) = storage.read_version()? else {
            if !is_empty_store(storage)? {
                return Err(MigrationError::NoUpgradePath {
                    from: 0,
                    to: latest,
                });
            }
            info!("[migrate] New store, stamping version {}", latest);
            storage.write_version(latest)?;
            return Ok(latest);
        };

        if current == latest {
            debug!("[migrate] Store already at version {}", current);
            return Ok(current);
        }
        if current > latest || current < self.oldest_version() {
            return Err(MigrationError::NoUpgradePath {
                from: current,
                to: latest,
            });
        }

        let start = current;
        for step in self.steps.iter().filter(|s| s.source_version >= start) {
            info!(
                "[migrate] Running {} ({} -> {})",
                step.name, step.source_version, step.target_version
            );
            let new_version = (step.run)(storage, oracle, &self.config, current)?;
            storage.write_version(new_version)?;
            info!("[migrate] Store now at version {}", new_version);
            current = new_version;
        }

        Ok(current)
    }
}

/// Whether the store holds no records at all. An unversioned store with
/// records has an unknown layout and cannot be stamped.
fn is_empty_store(storage: &dyn RecordStorage) -> Result<bool, MigrationError> {
    Ok(storage.get_all_state_changes()?.is_empty()
        && storage.get_all_event_records()?.is_empty()
        && storage.get_snapshots()?.is_empty())
}
