//! The four listing transitions. Each runs its guards first and only then
//! touches the store.

use crate::error::CallError;
use crate::guards::{self, Call, ClaimBundle};
use crate::store::{Field, RecordStore};
use crate::types::ListingParams;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Created,
    Claimed,
    Released,
    Destroyed,
}

pub fn create(
    store: &mut RecordStore,
    params: &ListingParams,
    call: &Call<'_>,
) -> Result<Transition, CallError> {
    let args = guards::check_create(params, call)?;
    store.install(args.into_record(params.creator));
    Ok(Transition::Created)
}

pub fn claim(store: &mut RecordStore, call: &Call<'_>) -> Result<Transition, CallError> {
    let record = store
        .record()
        .ok_or(CallError::WrongLifecycleState("no live listing"))?;
    let pair = guards::check_claim(record, call)?;
    apply_claim(store, &pair)?;
    Ok(Transition::Claimed)
}

fn apply_claim(store: &mut RecordStore, pair: &ClaimBundle<'_>) -> Result<(), CallError> {
    tracing::debug!(
        claimant = %pair.claimant(),
        amount = pair.amount(),
        previous = ?store.get(Field::CustodianAddress),
        field = Field::CustodianAddress.key(),
        "Transferring custody"
    );
    store.set(Field::CustodianName, pair.claimant_name())?;
    store.set(Field::CustodianAddress, *pair.claimant())?;
    store.set(Field::Claimed, true)?;
    Ok(())
}

/// Ownership fields stay as they are; the next claim overwrites them.
pub fn release(store: &mut RecordStore, call: &Call<'_>) -> Result<Transition, CallError> {
    let record = store
        .record()
        .ok_or(CallError::WrongLifecycleState("no live listing"))?;
    guards::check_release(record, call)?;
    store.set(Field::Claimed, false)?;
    Ok(Transition::Released)
}

pub fn destroy(
    store: &mut RecordStore,
    params: &ListingParams,
    call: &Call<'_>,
) -> Result<Transition, CallError> {
    guards::check_destroy(params, call)?;
    store.destroy();
    Ok(Transition::Destroyed)
}
