//! # Domain Module
//!
//! Record types, payload access, versions, policies, run reports and errors.

pub mod entities;
pub mod errors;
pub mod payload;
pub mod report;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use payload::{
    is_block_bound_state_change, is_contract_send, Payload, PayloadError, BLOCK_HASH_FIELD,
    BLOCK_NUMBER_FIELD, PENDING_TRANSACTIONS_FIELD, TRIGGERED_BY_BLOCK_HASH_FIELD, TYPE_FIELD,
};
pub use report::*;
pub use value_objects::*;
