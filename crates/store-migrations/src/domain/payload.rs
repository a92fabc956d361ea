//! # Payload Documents
//!
//! Typed access to the JSON documents stored in the record tables.
//!
//! ## Persisted Fields
//!
//! | Field | Carried by | Meaning |
//! |-------|-----------|---------|
//! | `_type` | every record and fragment | logical variant tag |
//! | `block_number` | block-bound state changes, snapshots | originating block |
//! | `block_hash` | state changes, snapshots (v19+) | hash of `block_number` |
//! | `triggered_by_block_hash` | contract-send events and fragments (v19+) | hash of the block that triggered the event |
//! | `pending_transactions` | snapshots | copies of contract-send event payloads |
//!
//! Variant tags are matched by containment, so fully qualified tags such as
//! `<app>.transfer.state_change.ContractReceiveChannelNew` qualify.

use super::entities::RecordRef;
use super::errors::MigrationError;
use super::value_objects::{BlockHash, BlockNumber};
use serde_json::{Map, Value};
use thiserror::Error;

/// Variant tag of every payload.
pub const TYPE_FIELD: &str = "_type";
/// Number of the block a record originates from.
pub const BLOCK_NUMBER_FIELD: &str = "block_number";
/// Hash of `block_number`, added to state changes and snapshots.
pub const BLOCK_HASH_FIELD: &str = "block_hash";
/// Hash of the block that triggered a contract-send event.
pub const TRIGGERED_BY_BLOCK_HASH_FIELD: &str = "triggered_by_block_hash";
/// Embedded contract-send fragments of a snapshot.
pub const PENDING_TRANSACTIONS_FIELD: &str = "pending_transactions";

/// State changes received from an on-chain contract.
pub const CONTRACT_RECEIVE_TAG: &str = "transfer.state_change.ContractReceive";
/// The state change that initializes the chain view.
pub const ACTION_INIT_CHAIN_TAG: &str = "transfer.state_change.ActionInitChain";
/// Events that send a transaction to an on-chain contract.
pub const CONTRACT_SEND_TAG: &str = "transfer.events.ContractSend";

/// Whether a state change of this variant is bound to a block and gets a
/// `block_hash` in v19.
pub fn is_block_bound_state_change(type_tag: &str) -> bool {
    type_tag.contains(CONTRACT_RECEIVE_TAG) || type_tag.contains(ACTION_INIT_CHAIN_TAG)
}

/// Whether an event (or pending-transaction fragment) of this variant gets a
/// `triggered_by_block_hash` in v19.
pub fn is_contract_send(type_tag: &str) -> bool {
    type_tag.contains(CONTRACT_SEND_TAG)
}

/// Shape violations found while reading a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The text is not valid JSON.
    #[error("malformed JSON: {0}")]
    Malformed(String),

    /// The document is valid JSON but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// No usable variant tag.
    #[error("missing or non-string `_type`")]
    MissingTypeTag,

    /// A field the record kind requires is absent.
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),

    /// A field is present but has the wrong shape.
    #[error("field `{field}` {reason}")]
    InvalidField {
        /// Name of the field.
        field: &'static str,
        /// What is wrong with its value.
        reason: String,
    },
}

impl PayloadError {
    /// Attach the record the payload belongs to.
    pub fn at(self, record: RecordRef) -> MigrationError {
        MigrationError::invalid(record, self.to_string())
    }
}

/// A parsed payload document.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    fields: Map<String, Value>,
}

impl Payload {
    /// Parse the raw text of a stored record.
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| PayloadError::Malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Wrap an already decoded document (e.g. an embedded fragment).
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// The `_type` tag.
    pub fn type_tag(&self) -> Result<&str, PayloadError> {
        self.fields
            .get(TYPE_FIELD)
            .and_then(Value::as_str)
            .ok_or(PayloadError::MissingTypeTag)
    }

    /// Whether `field` is present, whatever its value.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// The originating block number, if present.
    ///
    /// Block numbers are persisted either as JSON integers or as decimal
    /// strings; both are accepted.
    pub fn block_number(&self) -> Result<Option<BlockNumber>, PayloadError> {
        let invalid = |reason: String| PayloadError::InvalidField {
            field: BLOCK_NUMBER_FIELD,
            reason,
        };

        match self.fields.get(BLOCK_NUMBER_FIELD) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_u64()
                .map(|n| Some(BlockNumber(n)))
                .ok_or_else(|| invalid(format!("is not an unsigned integer: {}", number))),
            Some(Value::String(text)) => text
                .parse::<u64>()
                .map(|n| Some(BlockNumber(n)))
                .map_err(|_| invalid(format!("is not a decimal block number: {:?}", text))),
            Some(other) => Err(invalid(format!("has unexpected JSON type: {}", other))),
        }
    }

    /// The originating block number, which must be present.
    pub fn require_block_number(&self) -> Result<BlockNumber, PayloadError> {
        self.block_number()?
            .ok_or(PayloadError::MissingField(BLOCK_NUMBER_FIELD))
    }

    /// A hash-valued field, if present.
    pub fn hash_field(&self, field: &'static str) -> Result<Option<BlockHash>, PayloadError> {
        match self.fields.get(field) {
            None => Ok(None),
            Some(Value::String(hash)) => Ok(Some(BlockHash::new(hash.as_str()))),
            Some(other) => Err(PayloadError::InvalidField {
                field,
                reason: format!("is not a hash string: {}", other),
            }),
        }
    }

    /// Insert (or overwrite) a hash-valued field.
    pub fn set_hash(&mut self, field: &'static str, hash: &BlockHash) {
        self.fields
            .insert(field.to_string(), Value::String(hash.as_str().to_string()));
    }

    /// The embedded pending-transaction fragments of a snapshot.
    pub fn pending_transactions(&self) -> Result<&[Value], PayloadError> {
        match self.fields.get(PENDING_TRANSACTIONS_FIELD) {
            None => Err(PayloadError::MissingField(PENDING_TRANSACTIONS_FIELD)),
            Some(Value::Array(fragments)) => Ok(fragments),
            Some(other) => Err(PayloadError::InvalidField {
                field: PENDING_TRANSACTIONS_FIELD,
                reason: format!("is not a list: {}", other),
            }),
        }
    }

    /// Replace the embedded pending-transaction fragments.
    pub fn set_pending_transactions(&mut self, fragments: Vec<Value>) {
        self.fields.insert(
            PENDING_TRANSACTIONS_FIELD.to_string(),
            Value::Array(fragments),
        );
    }

    /// A copy of the document with `field` removed.
    pub fn without(&self, field: &str) -> Map<String, Value> {
        let mut fields = self.fields.clone();
        fields.remove(field);
        fields
    }

    /// The document fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Unwrap into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Serialize back to the stored text form.
    pub fn to_json(&self) -> Result<String, PayloadError> {
        serde_json::to_string(&self.fields).map_err(|e| PayloadError::Malformed(e.to_string()))
    }
}
