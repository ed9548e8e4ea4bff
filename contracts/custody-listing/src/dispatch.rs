use crate::auth;
use crate::error::CallError;
use crate::guards::{self, Call, CLAIM_TAG, RELEASE_TAG};
use crate::store::RecordStore;
use crate::transitions::{self, Transition};
use crate::types::{Bundle, ListingParams, OnCompletion, Status};

/// Evaluate one bundle against the committed store.
///
/// Returns the store the bundle would commit. The input store is never
/// touched, so a rejected bundle has no effect.
pub fn execute(
    store: &RecordStore,
    params: &ListingParams,
    bundle: &Bundle,
) -> Result<RecordStore, CallError> {
    let mut next = store.clone();
    apply(&mut next, params, bundle)?;
    Ok(next)
}

/// Rebuild a persisted store from its call log.
///
/// Every logged bundle must pass the same checks a live call does, and the
/// rebuilt store must equal the persisted one.
pub fn replay(persisted: &RecordStore, params: &ListingParams) -> Result<(), CallError> {
    let mut rebuilt = RecordStore::default();
    for bundle in persisted.log() {
        apply(&mut rebuilt, params, bundle)?;
    }
    if &rebuilt != persisted {
        return Err(CallError::HistoryMismatch);
    }
    Ok(())
}

/// Leaves `store` partially written on error; callers discard it.
fn apply(
    store: &mut RecordStore,
    params: &ListingParams,
    bundle: &Bundle,
) -> Result<Transition, CallError> {
    let verified = auth::authenticate(bundle)?;
    let call = verified.call()?;
    guards::check_fresh(store.sequence(), &call)?;

    let transition = route(store, params, &call)?;
    store.commit(bundle.clone())?;

    tracing::debug!(
        ?transition,
        sender = %call.sender,
        sequence = store.sequence(),
        status = ?store.status(),
        "Committed listing call"
    );
    Ok(transition)
}

fn route(
    store: &mut RecordStore,
    params: &ListingParams,
    call: &Call<'_>,
) -> Result<Transition, CallError> {
    match store.status() {
        Status::Destroyed => Err(CallError::WrongLifecycleState(
            "listing has been destroyed",
        )),
        Status::Uninstantiated => transitions::create(store, params, call),
        Status::Available | Status::Claimed => match call.on_completion {
            OnCompletion::Delete => transitions::destroy(store, params, call),
            OnCompletion::NoOp => match call.tag() {
                Some(tag) if tag == CLAIM_TAG => transitions::claim(store, call),
                Some(tag) if tag == RELEASE_TAG => transitions::release(store, call),
                Some(tag) => Err(CallError::UnrecognizedOperation(format!(
                    "tag {:?}",
                    String::from_utf8_lossy(tag)
                ))),
                None => Err(CallError::UnrecognizedOperation("missing tag".into())),
            },
            other => Err(CallError::UnrecognizedOperation(format!(
                "{other:?} completion"
            ))),
        },
    }
}
