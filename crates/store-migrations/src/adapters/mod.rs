//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of [`RecordStorage`](crate::ports::RecordStorage).

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryRecordStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStorage;
