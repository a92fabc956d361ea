//! # Store Migrations
//!
//! Versioned upgrade steps for the persisted record store of a payment
//! channel node (state changes, events, snapshots).
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Purpose
//!
//! The v18 → v19 step back-fills block hashes that older nodes never
//! persisted:
//! - `block_hash` on contract-receive and chain-init state changes
//! - `triggered_by_block_hash` on contract-send events
//! - both on snapshots and their embedded pending transactions
//!
//! Hashes come from a chain oracle, memoized per run so each distinct block
//! number is looked up at most once.
//!
//! ## Failure Model
//!
//! | Situation | Outcome |
//! |-----------|---------|
//! | Derived field already present | `InvalidPersistedData` (strict guard) |
//! | Event references zero or several state changes | `MissingReference` |
//! | Pending transaction matches zero or several events | `UnresolvedPendingTransaction` |
//! | Oracle down | `OracleUnavailable` (retryable) |
//!
//! Any error leaves the stored version untouched; the step reruns on the next
//! start.
//!
//! ## Module Structure
//!
//! ```text
//! store-migrations/
//! ├── domain/          # Record types, payload access, versions, errors
//! ├── algorithms/      # The three augmentation phases, guard, content matcher
//! ├── ports/           # MigrationApi (inbound) + RecordStorage, BlockOracle (outbound)
//! ├── application/     # BlockHashResolver, MigrationService, UpgradeDriver
//! ├── adapters/        # In-memory and SQLite record stores
//! └── config.rs        # MigrationConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::InMemoryRecordStorage;
#[cfg(feature = "sqlite")]
pub use adapters::SqliteRecordStorage;
pub use algorithms::{
    add_block_hash_to_events, add_block_hash_to_snapshots, add_block_hash_to_state_changes,
};
pub use application::{
    block_hash_backfill_step, upgrade, upgrade_v18_to_v19, BlockHashResolver, MigrationService,
    UpgradeDriver, UpgradeStep,
};
pub use config::{ConfigError, MigrationConfig};
pub use domain::{
    BlockHash, BlockInfo, BlockNumber, EventId, EventRecord, MigrationError, MigrationOutcome,
    MigrationReport, OracleError, PhaseGuard, PhaseReport, SnapshotId, SnapshotRecord,
    StateChangeId, StateChangeRecord, StorageError, TriggerFallback, SOURCE_VERSION,
    TARGET_VERSION,
};
pub use ports::{BlockOracle, MigrationApi, MockBlockOracle, RecordStorage};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
