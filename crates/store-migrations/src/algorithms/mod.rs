//! # Algorithms Module
//!
//! The three augmentation phases of the v18 → v19 upgrade, plus the version
//! guard and the content matcher they share.
//!
//! Phases must run in this order, each reading what the previous one wrote:
//! state changes, events, snapshots.

pub mod events;
pub mod guard;
pub mod matching;
pub mod snapshots;
pub mod state_changes;

pub use events::add_block_hash_to_events;
pub use guard::GuardDecision;
pub use matching::{AugmentedEventIndex, IndexedEvent};
pub use snapshots::{add_block_hash_to_snapshots, SnapshotPhaseReport};
pub use state_changes::add_block_hash_to_state_changes;

/// Emit a progress line every `every` records. Zero disables it.
pub(crate) fn log_progress(phase: &str, done: usize, total: usize, every: usize) {
    if every > 0 && done % every == 0 {
        tracing::debug!("[migrate] {}: {}/{} records", phase, done, total);
    }
}
