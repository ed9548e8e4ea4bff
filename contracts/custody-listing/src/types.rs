use std::fmt;

use freenet_stdlib::prelude::*;
use serde::{Deserialize, Serialize};

/// A ledger address: the Ed25519 verifying key of an account.
///
/// Encoded on the wire as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = ContractError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        hex_decode_array::<32>(&s).map(Self)
    }
}

impl TryFrom<&[u8]> for Address {
    type Error = ContractError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| ContractError::Deser("address must be 32 bytes".into()))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        hex_encode(&address.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Contract parameters baked into the ContractKey; immutable for the life of the contract.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ListingParams {
    /// Address allowed to create and destroy the listing.
    pub creator: Address,
}

impl ListingParams {
    pub fn from_parameters(parameters: &Parameters<'_>) -> Result<Self, ContractError> {
        serde_json::from_slice(parameters.as_ref())
            .map_err(|e| ContractError::Deser(format!("params: {e}")))
    }
}

/// What the caller asks the host to do with the contract once the call completes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnCompletion {
    NoOp,
    OptIn,
    CloseOut,
    Update,
    /// Termination request: remove the record and the contract instance.
    Delete,
}

/// Operation-specific payload of a transaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TxBody {
    /// A call against this contract.
    AppCall {
        on_completion: OnCompletion,
        /// Positional arguments, base64 on the wire.
        #[serde(with = "arg_codec")]
        args: Vec<Vec<u8>>,
        /// Store sequence the caller built this call against.
        sequence: u64,
    },
    /// Native value transfer.
    Payment { receiver: Address, amount: u64 },
    /// Transfer of a non-native asset. Never accepted as a claim payment.
    AssetTransfer {
        asset_id: u64,
        receiver: Address,
        amount: u64,
    },
}

/// One operation of a bundle, as authored by its sender.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub sender: Address,
    /// Free-form metadata; the creation marker travels here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Group id (hex 32 bytes) binding the members of a multi-operation bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub body: TxBody,
}

impl Transaction {
    /// Bytes the sender signs: `b"TX" || json(txn)`.
    pub fn signing_message(&self) -> Result<Vec<u8>, ContractError> {
        let json = serde_json::to_vec(self).map_err(|e| ContractError::Other(e.to_string()))?;
        let mut msg = Vec::with_capacity(2 + json.len());
        msg.extend_from_slice(b"TX");
        msg.extend_from_slice(&json);
        Ok(msg)
    }

    /// JSON encoding with the group field cleared, used to derive the group id.
    pub fn ungrouped_bytes(&self) -> Result<Vec<u8>, ContractError> {
        let ungrouped = Transaction {
            group: None,
            ..self.clone()
        };
        serde_json::to_vec(&ungrouped).map_err(|e| ContractError::Other(e.to_string()))
    }
}

/// A transaction plus its sender's Ed25519 signature (hex 64 bytes).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub txn: Transaction,
    pub signature: String,
}

/// An ordered set of operations committed or rejected as one unit.
///
/// Submitted as `UpdateData::Delta`. The first member is the call against
/// this contract; the rest are its companions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bundle {
    pub transactions: Vec<SignedTransaction>,
}

/// An update delta: a freshly submitted bundle, or the committed bundles a
/// lagging peer is missing (a JSON array, oldest first).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum ListingDelta {
    CatchUp(Vec<Bundle>),
    Call(Bundle),
}

impl ListingDelta {
    pub fn from_delta(bytes: &[u8]) -> Result<Self, ContractError> {
        serde_json::from_slice(bytes).map_err(|e| ContractError::Deser(format!("delta: {e}")))
    }

    pub fn into_bundles(self) -> Vec<Bundle> {
        match self {
            ListingDelta::Call(bundle) => vec![bundle],
            ListingDelta::CatchUp(bundles) => bundles,
        }
    }
}

/// Lifecycle status of the listing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Uninstantiated,
    Available,
    Claimed,
    Destroyed,
}

/// Summary for delta computation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    pub sequence: u64,
    pub status: Status,
}

/// Base64 encoding for positional call arguments.
mod arg_codec {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(args: &Vec<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(args.iter().map(base64::encode))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(deserializer)?;
        encoded
            .iter()
            .map(|arg| base64::decode(arg).map_err(D::Error::custom))
            .collect()
    }
}

/// Decode a hex string into bytes.
pub fn hex_decode(s: &str) -> Result<Vec<u8>, ContractError> {
    if s.len() % 2 != 0 {
        return Err(ContractError::Deser("odd-length hex string".into()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            s.get(i..i + 2)
                .ok_or_else(|| ContractError::Deser("non-ascii hex string".into()))
                .and_then(|pair| {
                    u8::from_str_radix(pair, 16).map_err(|e| ContractError::Deser(e.to_string()))
                })
        })
        .collect()
}

/// Decode a hex string into exactly `N` bytes.
pub fn hex_decode_array<const N: usize>(s: &str) -> Result<[u8; N], ContractError> {
    let bytes = hex_decode(s)?;
    bytes
        .try_into()
        .map_err(|_| ContractError::Deser(format!("expected {N} bytes")))
}

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}
