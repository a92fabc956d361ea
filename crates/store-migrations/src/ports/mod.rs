//! # Ports Layer
//!
//! - `inbound.rs` - Driving port (the upgrade step API)
//! - `outbound.rs` - Driven ports (record store, chain oracle)

pub mod inbound;
pub mod outbound;

pub use inbound::MigrationApi;
pub use outbound::{BlockOracle, MockBlockOracle, RecordStorage};
