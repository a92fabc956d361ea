//! # Application Module
//!
//! The upgrade step and the driver that sequences steps against a store.

pub mod driver;
pub mod resolver;
pub mod service;

pub use driver::{block_hash_backfill_step, StepFn, UpgradeDriver, UpgradeStep};
pub use resolver::BlockHashResolver;
pub use service::{upgrade, upgrade_v18_to_v19, MigrationService};
