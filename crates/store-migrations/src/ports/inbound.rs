//! # Inbound Ports
//!
//! API of an upgrade step as the host's bootstrap code sees it.

use crate::domain::{MigrationError, MigrationOutcome};
use crate::ports::outbound::RecordStorage;

/// One versioned upgrade step.
pub trait MigrationApi {
    /// Store version this step upgrades from.
    fn source_version(&self) -> u32;

    /// Store version this step produces.
    fn target_version(&self) -> u32;

    /// Run the step against `storage`.
    ///
    /// When `current_version` is not [`source_version`](Self::source_version)
    /// this is a no-op returning the target version without touching the store
    /// or the oracle. Stamping the store with the returned version is the
    /// caller's job.
    fn run(
        &self,
        storage: &mut dyn RecordStorage,
        current_version: u32,
    ) -> Result<MigrationOutcome, MigrationError>;
}
