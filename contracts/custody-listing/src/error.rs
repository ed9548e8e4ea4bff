use freenet_stdlib::prelude::ContractError;

use crate::store::Field;

/// Why a call was rejected. Every variant rejects the whole bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    #[error("malformed arguments: {0}")]
    MalformedArguments(&'static str),
    #[error("invalid amount: {0}")]
    InvalidAmount(&'static str),
    #[error("wrong lifecycle state: {0}")]
    WrongLifecycleState(&'static str),
    #[error("authorization failure: {0}")]
    AuthorizationFailure(&'static str),
    #[error("bundle integrity failure: {0}")]
    BundleIntegrityFailure(&'static str),
    #[error("custodian cannot claim their own listing")]
    SelfTransferRejected,
    #[error("unrecognized operation: {0}")]
    UnrecognizedOperation(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(&'static str),
    #[error("stale call: built against sequence {got}, store is at {expected}")]
    StaleCall { expected: u64, got: u64 },
    #[error("state does not match its call history")]
    HistoryMismatch,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure to coerce a value into a record field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("no live record")]
    NoRecord,
    #[error("{field:?} does not accept {found} values")]
    TypeMismatch { field: Field, found: &'static str },
    #[error("{0:?} requires UTF-8 text")]
    NotUtf8(Field),
    #[error("{field:?} expects a different length, got {len} bytes")]
    Length { field: Field, len: usize },
    #[error("{field:?} value {value} out of range")]
    OutOfRange { field: Field, value: u64 },
    #[error("call sequence exhausted")]
    SequenceExhausted,
}

impl From<CallError> for ContractError {
    fn from(err: CallError) -> Self {
        ContractError::Other(format!("call rejected: {err}"))
    }
}
