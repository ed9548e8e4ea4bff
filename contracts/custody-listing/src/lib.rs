//! Custody Listing: Freenet WASM contract holding a single listing record
//! that can be claimed by paying its current custodian and released again.
//!
//! Parameters name the creator. State is the JSON `RecordStore`; empty state
//! means the creation call has not landed yet. Every update delta carries
//! signed call bundles, and each bundle either commits in full or has no
//! effect. The store keeps the bundles it committed, so any peer can check a
//! state by replaying them.

mod auth;
mod dispatch;
mod error;
mod guards;
mod store;
mod transitions;
mod types;

use freenet_stdlib::prelude::*;
use store::RecordStore;
use types::{ListingDelta, ListingParams, RecordSummary};

pub struct Contract;

#[contract]
impl ContractInterface for Contract {
    fn validate_state(
        parameters: Parameters<'static>,
        state: State<'static>,
        _related: RelatedContracts<'static>,
    ) -> Result<ValidateResult, ContractError> {
        let params = ListingParams::from_parameters(&parameters)?;
        let store = RecordStore::from_state(&state)?;
        if !store.is_consistent() {
            return Ok(ValidateResult::Invalid);
        }

        match dispatch::replay(&store, &params) {
            Ok(()) => Ok(ValidateResult::Valid),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    sequence = store.sequence(),
                    "Custody listing: state does not replay from its call log"
                );
                Ok(ValidateResult::Invalid)
            }
        }
    }

    fn update_state(
        parameters: Parameters<'static>,
        state: State<'static>,
        data: Vec<UpdateData<'static>>,
    ) -> Result<UpdateModification<'static>, ContractError> {
        let params = ListingParams::from_parameters(&parameters).inspect_err(|e| {
            tracing::warn!(error = %e, "Custody listing: unreadable contract parameters");
        })?;
        let mut store = RecordStore::from_state(&state)?;

        let mut committed = false;
        let mut first_rejection = None;

        for ud in data {
            match ud {
                UpdateData::Delta(delta) if !delta.as_ref().is_empty() => {
                    for bundle in ListingDelta::from_delta(delta.as_ref())?.into_bundles() {
                        if store.has_committed(&bundle) {
                            committed = true;
                            continue;
                        }
                        match dispatch::execute(&store, &params, &bundle) {
                            Ok(next) => {
                                store = next;
                                committed = true;
                            }
                            Err(err) => {
                                // Rejected bundles are dropped; later ones still run.
                                tracing::warn!(
                                    error = %err,
                                    sequence = store.sequence(),
                                    "Custody listing: call rejected"
                                );
                                first_rejection.get_or_insert(err);
                            }
                        }
                    }
                }
                UpdateData::State(incoming) | UpdateData::StateAndDelta { state: incoming, .. }
                    if !incoming.as_ref().is_empty() =>
                {
                    // Full state replacement (network sync): accept only a
                    // verified continuation of the local history
                    let incoming = RecordStore::from_state(&incoming)?;
                    if !store.is_extended_by(&incoming) {
                        tracing::debug!(
                            local = store.sequence(),
                            incoming = incoming.sequence(),
                            "Custody listing: ignoring state that does not extend local history"
                        );
                    } else if let Err(err) = dispatch::replay(&incoming, &params) {
                        tracing::warn!(
                            error = %err,
                            incoming = incoming.sequence(),
                            "Custody listing: rejecting unverifiable state"
                        );
                        first_rejection.get_or_insert(err);
                    } else {
                        store = incoming;
                        committed = true;
                    }
                }
                _ => {}
            }
        }

        match first_rejection {
            Some(err) if !committed => Err(err.into()),
            _ => Ok(UpdateModification::valid(store.to_state()?)),
        }
    }

    fn summarize_state(
        _parameters: Parameters<'static>,
        state: State<'static>,
    ) -> Result<StateSummary<'static>, ContractError> {
        let store = RecordStore::from_state(&state)?;
        let bytes = serde_json::to_vec(&store.summary())
            .map_err(|e| ContractError::Other(e.to_string()))?;
        Ok(StateSummary::from(bytes))
    }

    fn get_state_delta(
        _parameters: Parameters<'static>,
        state: State<'static>,
        summary: StateSummary<'static>,
    ) -> Result<StateDelta<'static>, ContractError> {
        let summary: RecordSummary = serde_json::from_slice(summary.as_ref())
            .map_err(|e| ContractError::Deser(e.to_string()))?;
        let store = RecordStore::from_state(&state)?;

        // Peer in sync or ahead → nothing to send
        let missing = store.calls_since(summary.sequence);
        if missing.is_empty() {
            return Ok(StateDelta::from(Vec::new()));
        }

        let bytes = serde_json::to_vec(missing).map_err(|e| ContractError::Other(e.to_string()))?;
        Ok(StateDelta::from(bytes))
    }
}
