//! Version guard shared by the augmentation phases.
//!
//! A guarded unit is a whole phase for the batch-written tables and a single
//! snapshot for snapshots, because those are exactly the scopes a crashed run
//! can leave half done.

use crate::domain::{MigrationError, PhaseGuard, RecordRef};

/// What a phase should do with its qualifying records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// No record carries the derived field yet.
    Upgrade,
    /// Every record already carries it (resumable runs only).
    AlreadyUpgraded,
}

/// Decide how to treat a unit of `qualifying` records of which `upgraded`
/// already carry `field`.
pub fn check(
    guard: PhaseGuard,
    field: &str,
    qualifying: usize,
    upgraded: &[RecordRef],
) -> Result<GuardDecision, MigrationError> {
    let Some(first) = upgraded.first() else {
        return Ok(GuardDecision::Upgrade);
    };

    match guard {
        PhaseGuard::Strict => Err(MigrationError::invalid(
            *first,
            format!("`{}` already present before upgrade", field),
        )),
        PhaseGuard::Resumable if upgraded.len() == qualifying => Ok(GuardDecision::AlreadyUpgraded),
        PhaseGuard::Resumable => Err(MigrationError::invalid(
            *first,
            format!(
                "partially upgraded: {} of {} records already carry `{}`",
                upgraded.len(),
                qualifying,
                field
            ),
        )),
    }
}
