//! Bundle authentication.
//!
//! Every member must be signed by its own sender, and the members of a
//! multi-operation bundle must all carry the same group id, derived from the
//! whole member list. A signed payment therefore cannot be lifted out of one
//! bundle and paired with a different call.

use ed25519_dalek::{Signature, VerifyingKey};
use freenet_stdlib::prelude::ContractError;
use sha2::{Digest, Sha256};

use crate::error::CallError;
use crate::guards::Call;
use crate::types::{hex_decode_array, hex_encode, Bundle, SignedTransaction, Transaction};

/// Largest bundle a ledger will order as one unit.
pub const MAX_BUNDLE_SIZE: usize = 16;

/// A bundle whose signatures and grouping have been checked.
#[derive(Debug)]
pub struct VerifiedBundle<'a> {
    members: Vec<&'a Transaction>,
}

impl VerifiedBundle<'_> {
    pub fn call(&self) -> Result<Call<'_>, CallError> {
        Call::from_members(&self.members)
    }
}

/// Group id: `SHA-256(b"TG" || SHA-256(member_0) || SHA-256(member_1) || ...)`,
/// each member hashed with its own group field cleared.
pub fn group_id<'a>(
    members: impl IntoIterator<Item = &'a Transaction>,
) -> Result<[u8; 32], ContractError> {
    let mut hasher = Sha256::new();
    hasher.update(b"TG");
    for txn in members {
        hasher.update(Sha256::digest(txn.ungrouped_bytes()?));
    }
    Ok(hasher.finalize().into())
}

pub fn authenticate(bundle: &Bundle) -> Result<VerifiedBundle<'_>, CallError> {
    let members = &bundle.transactions;
    if members.is_empty() {
        return Err(CallError::BundleIntegrityFailure("empty bundle"));
    }
    if members.len() > MAX_BUNDLE_SIZE {
        return Err(CallError::BundleIntegrityFailure(
            "bundle exceeds 16 operations",
        ));
    }

    for member in members {
        verify_signature(member)?;
    }

    // A lone call may omit the group; if it names one it must still match.
    if members.len() > 1 || members[0].txn.group.is_some() {
        let expected = group_id(members.iter().map(|m| &m.txn))
            .map(|id| hex_encode(&id))
            .map_err(|_| CallError::Unauthenticated("unencodable transaction"))?;
        if members
            .iter()
            .any(|m| m.txn.group.as_deref() != Some(expected.as_str()))
        {
            return Err(CallError::BundleIntegrityFailure(
                "group id does not match bundle members",
            ));
        }
    }

    Ok(VerifiedBundle {
        members: members.iter().map(|m| &m.txn).collect(),
    })
}

fn verify_signature(member: &SignedTransaction) -> Result<(), CallError> {
    let vk = VerifyingKey::from_bytes(member.txn.sender.as_bytes())
        .map_err(|_| CallError::Unauthenticated("sender is not an ed25519 key"))?;
    let sig_bytes = hex_decode_array::<64>(&member.signature)
        .map_err(|_| CallError::Unauthenticated("signature must be 64 hex-encoded bytes"))?;
    let sig = Signature::from_bytes(&sig_bytes);
    let msg = member
        .txn
        .signing_message()
        .map_err(|_| CallError::Unauthenticated("unencodable transaction"))?;
    vk.verify_strict(&msg, &sig)
        .map_err(|_| CallError::Unauthenticated("signature verification failed"))
}
