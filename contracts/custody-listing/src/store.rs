//! The listing's global state: one record per contract instance plus the
//! signed bundles that produced it.
//!
//! Values move in and out through the two storage kinds a ledger's global
//! state offers (`Bytes` and `Uint`) and are coerced into the record's typed
//! fields on `set`. Nothing here checks whether a write is *allowed*; that is
//! the guards' job.
//!
//! The call log makes a state self-authenticating: replaying it from an empty
//! store must land on exactly the persisted record.

use freenet_stdlib::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Address, Bundle, RecordSummary, Status};

/// The listing record.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub description: String,
    pub image_ref: String,
    /// Exact payment a claimant must send to the current custodian.
    pub required_amount: u64,
    pub claimed: bool,
    pub custodian_address: Address,
    pub custodian_name: String,
}

impl Record {
    /// Non-empty text fields and a positive required amount.
    pub fn is_well_formed(&self) -> bool {
        !self.name.is_empty()
            && !self.description.is_empty()
            && !self.image_ref.is_empty()
            && !self.custodian_name.is_empty()
            && self.required_amount > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Name,
    Description,
    ImageRef,
    RequiredAmount,
    Claimed,
    CustodianAddress,
    CustodianName,
}

impl Field {
    /// Global-state key.
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "NAME",
            Field::Description => "DESCRIPTION",
            Field::ImageRef => "IMAGE",
            Field::RequiredAmount => "AMOUNT",
            Field::Claimed => "CLAIMED",
            Field::CustodianAddress => "ADDRESS",
            Field::CustodianName => "OWNER",
        }
    }
}

/// A raw global-state value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Bytes(Vec<u8>),
    Uint(u64),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Uint(_) => "uint",
        }
    }

    fn into_bytes(self, field: Field) -> Result<Vec<u8>, StoreError> {
        match self {
            Value::Bytes(bytes) => Ok(bytes),
            other => Err(StoreError::TypeMismatch {
                field,
                found: other.kind(),
            }),
        }
    }

    fn into_text(self, field: Field) -> Result<String, StoreError> {
        String::from_utf8(self.into_bytes(field)?).map_err(|_| StoreError::NotUtf8(field))
    }

    fn into_uint(self, field: Field) -> Result<u64, StoreError> {
        match self {
            Value::Uint(n) => Ok(n),
            other => Err(StoreError::TypeMismatch {
                field,
                found: other.kind(),
            }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Bytes(s.as_bytes().to_vec())
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Uint(n)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Uint(u64::from(flag))
    }
}

impl From<Address> for Value {
    fn from(address: Address) -> Self {
        Value::Bytes(address.as_bytes().to_vec())
    }
}

/// Where the listing is in its lifecycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum Phase {
    /// Contract instantiated, creation call not yet committed. Never persisted.
    #[default]
    Uninstantiated,
    Live(Record),
    /// Terminal tombstone; the record is gone.
    Destroyed,
}

/// The contract state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct RecordStore {
    sequence: u64,
    phase: Phase,
    /// Every committed bundle, in commit order.
    #[serde(default)]
    log: Vec<Bundle>,
}

impl RecordStore {
    /// Decode contract state. Empty bytes are an uninstantiated store.
    pub fn from_state(state: &State<'_>) -> Result<Self, ContractError> {
        let bytes = state.as_ref();
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|e| ContractError::Deser(format!("state: {e}")))
    }

    pub fn to_state(&self) -> Result<State<'static>, ContractError> {
        if self.phase == Phase::Uninstantiated {
            return Ok(State::from(Vec::new()));
        }
        let bytes = serde_json::to_vec(self).map_err(|e| ContractError::Other(e.to_string()))?;
        Ok(State::from(bytes))
    }

    /// Committed calls so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn log(&self) -> &[Bundle] {
        &self.log
    }

    /// Bundles committed at or after `sequence`.
    pub fn calls_since(&self, sequence: u64) -> &[Bundle] {
        let start = usize::try_from(sequence).unwrap_or(usize::MAX);
        self.log.get(start..).unwrap_or_default()
    }

    pub fn has_committed(&self, bundle: &Bundle) -> bool {
        self.log.contains(bundle)
    }

    /// Whether `other` is this store's history plus further calls.
    pub fn is_extended_by(&self, other: &RecordStore) -> bool {
        other.sequence > self.sequence && other.log.starts_with(&self.log)
    }

    pub fn record(&self) -> Option<&Record> {
        match &self.phase {
            Phase::Live(record) => Some(record),
            _ => None,
        }
    }

    pub fn status(&self) -> Status {
        match &self.phase {
            Phase::Uninstantiated => Status::Uninstantiated,
            Phase::Live(record) if record.claimed => Status::Claimed,
            Phase::Live(_) => Status::Available,
            Phase::Destroyed => Status::Destroyed,
        }
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            sequence: self.sequence,
            status: self.status(),
        }
    }

    /// Cheap shape checks. Provenance is established by replaying the log.
    pub fn is_consistent(&self) -> bool {
        if u64::try_from(self.log.len()).ok() != Some(self.sequence) {
            return false;
        }
        match &self.phase {
            Phase::Uninstantiated => self.sequence == 0,
            Phase::Live(record) => self.sequence > 0 && record.is_well_formed(),
            Phase::Destroyed => self.sequence > 0,
        }
    }

    pub fn get(&self, field: Field) -> Option<Value> {
        let record = self.record()?;
        let value = match field {
            Field::Name => Value::from(record.name.as_str()),
            Field::Description => Value::from(record.description.as_str()),
            Field::ImageRef => Value::from(record.image_ref.as_str()),
            Field::RequiredAmount => Value::from(record.required_amount),
            Field::Claimed => Value::from(record.claimed),
            Field::CustodianAddress => Value::from(record.custodian_address),
            Field::CustodianName => Value::from(record.custodian_name.as_str()),
        };
        Some(value)
    }

    pub(crate) fn set(&mut self, field: Field, value: impl Into<Value>) -> Result<(), StoreError> {
        let Phase::Live(record) = &mut self.phase else {
            return Err(StoreError::NoRecord);
        };
        let value = value.into();
        match field {
            Field::Name => record.name = value.into_text(field)?,
            Field::Description => record.description = value.into_text(field)?,
            Field::ImageRef => record.image_ref = value.into_text(field)?,
            Field::CustodianName => record.custodian_name = value.into_text(field)?,
            Field::RequiredAmount => record.required_amount = value.into_uint(field)?,
            Field::Claimed => {
                record.claimed = match value.into_uint(field)? {
                    0 => false,
                    1 => true,
                    other => return Err(StoreError::OutOfRange { field, value: other }),
                }
            }
            Field::CustodianAddress => {
                let bytes = value.into_bytes(field)?;
                record.custodian_address = Address::try_from(bytes.as_slice())
                    .map_err(|_| StoreError::Length {
                        field,
                        len: bytes.len(),
                    })?;
            }
        }
        Ok(())
    }

    pub(crate) fn install(&mut self, record: Record) {
        self.phase = Phase::Live(record);
    }

    pub(crate) fn destroy(&mut self) {
        self.phase = Phase::Destroyed;
    }

    /// Append a committed bundle and advance the sequence.
    pub(crate) fn commit(&mut self, bundle: Bundle) -> Result<(), StoreError> {
        self.sequence = self
            .sequence
            .checked_add(1)
            .ok_or(StoreError::SequenceExhausted)?;
        self.log.push(bundle);
        Ok(())
    }
}
