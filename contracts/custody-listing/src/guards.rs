//! Admission rules for every listing transition.
//!
//! Guards are pure: they read the current record, the call, and the
//! operations bundled with it, and either hand back a value proving the call
//! is admissible or name the first rule it breaks. Nothing here writes state.

use crate::error::CallError;
use crate::store::Record;
use crate::types::{Address, ListingParams, OnCompletion, Transaction, TxBody};

/// Metadata marker a creation call must carry.
pub const CREATION_NOTE: &str = "custody-listing:uv1";
/// name, description, image ref, required amount, custodian name.
pub const CREATE_ARG_COUNT: usize = 5;
/// tag, name.
pub const CALL_ARG_COUNT: usize = 2;
/// The claim call plus its payment.
pub const CLAIM_BUNDLE_SIZE: usize = 2;

pub const CLAIM_TAG: &[u8] = b"claim";
pub const RELEASE_TAG: &[u8] = b"release";

/// A contract call together with every operation bundled with it.
#[derive(Clone, Copy, Debug)]
pub struct Call<'a> {
    pub sender: &'a Address,
    pub note: Option<&'a str>,
    pub on_completion: OnCompletion,
    pub args: &'a [Vec<u8>],
    pub sequence: u64,
    /// All bundle members, this call first.
    pub bundle: &'a [&'a Transaction],
}

impl<'a> Call<'a> {
    /// View the first bundle member as the contract call.
    pub fn from_members(members: &'a [&'a Transaction]) -> Result<Self, CallError> {
        let Some(first) = members.first() else {
            return Err(CallError::BundleIntegrityFailure("empty bundle"));
        };
        let TxBody::AppCall {
            on_completion,
            args,
            sequence,
        } = &first.body
        else {
            return Err(CallError::BundleIntegrityFailure(
                "first operation must be a contract call",
            ));
        };
        Ok(Self {
            sender: &first.sender,
            note: first.note.as_deref(),
            on_completion: *on_completion,
            args,
            sequence: *sequence,
            bundle: members,
        })
    }

    /// Operation selector (argument 0).
    pub fn tag(&self) -> Option<&'a [u8]> {
        self.args.first().map(Vec::as_slice)
    }
}

/// Creation arguments that passed every creation guard.
#[derive(Debug, PartialEq, Eq)]
pub struct CreateArgs<'a> {
    name: &'a str,
    description: &'a str,
    image_ref: &'a str,
    required_amount: u64,
    custodian_name: &'a str,
}

impl CreateArgs<'_> {
    /// The initial record: available, held by the creator.
    pub fn into_record(self, creator: Address) -> Record {
        Record {
            name: self.name.to_owned(),
            description: self.description.to_owned(),
            image_ref: self.image_ref.to_owned(),
            required_amount: self.required_amount,
            claimed: false,
            custodian_address: creator,
            custodian_name: self.custodian_name.to_owned(),
        }
    }
}

/// A claim call and its payment, validated together.
///
/// Only [`check_claim`] builds one, so the claim mutation cannot run
/// without the payment guards having passed.
#[derive(Debug, PartialEq, Eq)]
pub struct ClaimBundle<'a> {
    claimant: &'a Address,
    claimant_name: &'a str,
    amount: u64,
}

impl ClaimBundle<'_> {
    /// Sender of both the claim call and the payment.
    pub fn claimant(&self) -> &Address {
        self.claimant
    }

    pub fn claimant_name(&self) -> &str {
        self.claimant_name
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// The call must have been built against the committed sequence.
pub fn check_fresh(store_sequence: u64, call: &Call<'_>) -> Result<(), CallError> {
    if call.sequence != store_sequence {
        return Err(CallError::StaleCall {
            expected: store_sequence,
            got: call.sequence,
        });
    }
    Ok(())
}

pub fn check_create<'a>(
    params: &ListingParams,
    call: &Call<'a>,
) -> Result<CreateArgs<'a>, CallError> {
    if call.note != Some(CREATION_NOTE) {
        return Err(CallError::MalformedArguments("missing creation marker"));
    }
    if call.on_completion != OnCompletion::NoOp {
        return Err(CallError::MalformedArguments("creation must be a plain call"));
    }
    if call.args.len() != CREATE_ARG_COUNT {
        return Err(CallError::MalformedArguments(
            "creation takes exactly 5 arguments",
        ));
    }

    let required_amount = parse_amount(&call.args[3])?;
    let name = non_empty_text(&call.args[0], "name must be non-empty UTF-8")?;
    let description = non_empty_text(&call.args[1], "description must be non-empty UTF-8")?;
    let image_ref = non_empty_text(&call.args[2], "image ref must be non-empty UTF-8")?;
    let custodian_name = non_empty_text(&call.args[4], "custodian name must be non-empty UTF-8")?;

    if call.sender != &params.creator {
        return Err(CallError::AuthorizationFailure(
            "only the creator can create the listing",
        ));
    }

    Ok(CreateArgs {
        name,
        description,
        image_ref,
        required_amount,
        custodian_name,
    })
}

pub fn check_claim<'a>(record: &Record, call: &Call<'a>) -> Result<ClaimBundle<'a>, CallError> {
    if call.bundle.len() != CLAIM_BUNDLE_SIZE {
        return Err(CallError::BundleIntegrityFailure(
            "claim must be bundled with exactly one payment",
        ));
    }
    if call.args.len() != CALL_ARG_COUNT {
        return Err(CallError::MalformedArguments("claim takes exactly 2 arguments"));
    }
    let claimant_name = non_empty_text(&call.args[1], "claimant name must be non-empty UTF-8")?;
    if record.claimed {
        return Err(CallError::WrongLifecycleState("listing is already claimed"));
    }
    if &record.custodian_address == call.sender {
        return Err(CallError::SelfTransferRejected);
    }

    let companion = call.bundle[1];
    let TxBody::Payment { receiver, amount } = &companion.body else {
        return Err(CallError::BundleIntegrityFailure(
            "companion operation must be a payment",
        ));
    };
    if receiver != &record.custodian_address {
        return Err(CallError::BundleIntegrityFailure(
            "payment must go to the current custodian",
        ));
    }
    if *amount != record.required_amount {
        return Err(CallError::BundleIntegrityFailure(
            "payment must equal the required amount",
        ));
    }
    if &companion.sender != call.sender {
        return Err(CallError::BundleIntegrityFailure(
            "payment must come from the claimant",
        ));
    }

    Ok(ClaimBundle {
        claimant: &companion.sender,
        claimant_name,
        amount: *amount,
    })
}

pub fn check_release(record: &Record, call: &Call<'_>) -> Result<(), CallError> {
    if call.args.len() != CALL_ARG_COUNT {
        return Err(CallError::MalformedArguments(
            "release takes exactly 2 arguments",
        ));
    }
    if !record.claimed {
        return Err(CallError::WrongLifecycleState("listing is not claimed"));
    }
    if call.args[1] != record.custodian_name.as_bytes() {
        return Err(CallError::AuthorizationFailure(
            "name does not match the custodian",
        ));
    }
    if call.sender != &record.custodian_address {
        return Err(CallError::AuthorizationFailure("caller is not the custodian"));
    }
    Ok(())
}

pub fn check_destroy(params: &ListingParams, call: &Call<'_>) -> Result<(), CallError> {
    if call.sender != &params.creator {
        return Err(CallError::AuthorizationFailure(
            "only the creator can destroy the listing",
        ));
    }
    Ok(())
}

/// Decimal digits only, no sign or whitespace, greater than zero.
fn parse_amount(raw: &[u8]) -> Result<u64, CallError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| CallError::InvalidAmount("amount must be decimal digits"))?;
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CallError::InvalidAmount("amount must be decimal digits"));
    }
    let amount: u64 = text
        .parse()
        .map_err(|_| CallError::InvalidAmount("amount does not fit in 64 bits"))?;
    if amount == 0 {
        return Err(CallError::InvalidAmount("amount must be greater than zero"));
    }
    Ok(amount)
}

fn non_empty_text<'a>(raw: &'a [u8], what: &'static str) -> Result<&'a str, CallError> {
    match std::str::from_utf8(raw) {
        Ok(text) if !text.is_empty() => Ok(text),
        _ => Err(CallError::MalformedArguments(what)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALICE: Address = Address::from_bytes([0xA1; 32]);
    const BOB: Address = Address::from_bytes([0xB0; 32]);
    const CAROL: Address = Address::from_bytes([0xC0; 32]);

    fn params() -> ListingParams {
        ListingParams { creator: ALICE }
    }

    fn record(claimed: bool) -> Record {
        Record {
            name: "Rex".into(),
            description: "Dog".into(),
            image_ref: "rex.png".into(),
            required_amount: 1000,
            claimed,
            custodian_address: ALICE,
            custodian_name: "Alice".into(),
        }
    }

    fn app_call(sender: Address, note: Option<&str>, args: &[&[u8]]) -> Transaction {
        Transaction {
            sender,
            note: note.map(str::to_owned),
            group: None,
            body: TxBody::AppCall {
                on_completion: OnCompletion::NoOp,
                args: args.iter().map(|a| a.to_vec()).collect(),
                sequence: 0,
            },
        }
    }

    fn payment(sender: Address, receiver: Address, amount: u64) -> Transaction {
        Transaction {
            sender,
            note: None,
            group: None,
            body: TxBody::Payment { receiver, amount },
        }
    }

    fn create_call(args: &[&[u8]]) -> Transaction {
        app_call(ALICE, Some(CREATION_NOTE), args)
    }

    const VALID_CREATE: [&[u8]; 5] = [b"Rex", b"Dog", b"rex.png", b"1000", b"Alice"];

    #[test]
    fn test_create_admits_valid_arguments() {
        let txn = create_call(&VALID_CREATE);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        let args = check_create(&params(), &call).unwrap();
        assert_eq!(args.into_record(ALICE), record(false));
    }

    fn create_args_with(index: usize, value: &'static [u8]) -> [&'static [u8]; 5] {
        let mut args = VALID_CREATE;
        args[index] = value;
        args
    }

    #[rstest]
    #[case::empty_name(0, b"")]
    #[case::empty_description(1, b"")]
    #[case::empty_image(2, b"")]
    #[case::empty_custodian_name(4, b"")]
    #[case::non_utf8_name(0, b"\xff\xfe")]
    fn test_create_rejects_empty_text(#[case] index: usize, #[case] value: &'static [u8]) {
        let txn = create_call(&create_args_with(index, value));
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert!(matches!(
            check_create(&params(), &call),
            Err(CallError::MalformedArguments(_))
        ));
    }

    #[rstest]
    #[case::zero(b"0")]
    #[case::negative(b"-5")]
    #[case::signed(b"+5")]
    #[case::padded(b" 5")]
    #[case::empty(b"")]
    #[case::not_a_number(b"ten")]
    #[case::overflow(b"18446744073709551616")]
    fn test_create_rejects_bad_amount(#[case] amount: &'static [u8]) {
        let txn = create_call(&create_args_with(3, amount));
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert!(matches!(
            check_create(&params(), &call),
            Err(CallError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_create_accepts_max_amount() {
        let txn = create_call(&create_args_with(3, b"18446744073709551615"));
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        let record = check_create(&params(), &call).unwrap().into_record(ALICE);
        assert_eq!(record.required_amount, u64::MAX);
    }

    #[test]
    fn test_create_requires_marker_and_arity() {
        let unmarked = app_call(ALICE, Some("custody-listing:uv2"), &VALID_CREATE);
        let members = [&unmarked];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(
            check_create(&params(), &call),
            Err(CallError::MalformedArguments("missing creation marker"))
        );

        let short = create_call(&VALID_CREATE[..4]);
        let members = [&short];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(
            check_create(&params(), &call),
            Err(CallError::MalformedArguments(
                "creation takes exactly 5 arguments"
            ))
        );
    }

    #[test]
    fn test_create_only_by_creator() {
        let txn = app_call(BOB, Some(CREATION_NOTE), &VALID_CREATE);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert!(matches!(
            check_create(&params(), &call),
            Err(CallError::AuthorizationFailure(_))
        ));
    }

    #[test]
    fn test_claim_admits_exact_payment() {
        let call_txn = app_call(BOB, None, &[CLAIM_TAG, b"Bob"]);
        let pay = payment(BOB, ALICE, 1000);
        let members = [&call_txn, &pay];
        let call = Call::from_members(&members).unwrap();
        let pair = check_claim(&record(false), &call).unwrap();
        assert_eq!(pair.claimant(), &BOB);
        assert_eq!(pair.claimant_name(), "Bob");
        assert_eq!(pair.amount(), 1000);
    }

    #[rstest]
    #[case::wrong_receiver(payment(BOB, CAROL, 1000), "payment must go to the current custodian")]
    #[case::underpaid(payment(BOB, ALICE, 999), "payment must equal the required amount")]
    #[case::overpaid(payment(BOB, ALICE, 1001), "payment must equal the required amount")]
    #[case::third_party_payer(payment(CAROL, ALICE, 1000), "payment must come from the claimant")]
    #[case::asset_transfer(
        Transaction {
            sender: BOB,
            note: None,
            group: None,
            body: TxBody::AssetTransfer { asset_id: 7, receiver: ALICE, amount: 1000 },
        },
        "companion operation must be a payment"
    )]
    fn test_claim_rejects_mismatched_payment(#[case] companion: Transaction, #[case] reason: &str) {
        let call_txn = app_call(BOB, None, &[CLAIM_TAG, b"Bob"]);
        let members = [&call_txn, &companion];
        let call = Call::from_members(&members).unwrap();
        match check_claim(&record(false), &call) {
            Err(CallError::BundleIntegrityFailure(got)) => assert_eq!(got, reason),
            other => panic!("expected bundle integrity failure, got {other:?}"),
        }
    }

    #[test]
    fn test_claim_requires_exactly_two_members() {
        let call_txn = app_call(BOB, None, &[CLAIM_TAG, b"Bob"]);
        let pay = payment(BOB, ALICE, 1000);

        let alone = [&call_txn];
        let call = Call::from_members(&alone).unwrap();
        assert!(matches!(
            check_claim(&record(false), &call),
            Err(CallError::BundleIntegrityFailure(_))
        ));

        let padded = [&call_txn, &pay, &pay];
        let call = Call::from_members(&padded).unwrap();
        assert!(matches!(
            check_claim(&record(false), &call),
            Err(CallError::BundleIntegrityFailure(_))
        ));
    }

    #[test]
    fn test_claim_rejects_when_already_claimed() {
        let call_txn = app_call(BOB, None, &[CLAIM_TAG, b"Bob"]);
        let pay = payment(BOB, ALICE, 1000);
        let members = [&call_txn, &pay];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(
            check_claim(&record(true), &call),
            Err(CallError::WrongLifecycleState("listing is already claimed"))
        );
    }

    #[test]
    fn test_claim_rejects_self_claim() {
        let call_txn = app_call(ALICE, None, &[CLAIM_TAG, b"Alice"]);
        let pay = payment(ALICE, ALICE, 1000);
        let members = [&call_txn, &pay];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(
            check_claim(&record(false), &call),
            Err(CallError::SelfTransferRejected)
        );
    }

    #[rstest]
    #[case::missing_name(&[CLAIM_TAG])]
    #[case::empty_name(&[CLAIM_TAG, b""])]
    #[case::extra_argument(&[CLAIM_TAG, b"Bob", b"extra"])]
    fn test_claim_rejects_malformed_arguments(#[case] args: &[&[u8]]) {
        let call_txn = app_call(BOB, None, args);
        let pay = payment(BOB, ALICE, 1000);
        let members = [&call_txn, &pay];
        let call = Call::from_members(&members).unwrap();
        assert!(matches!(
            check_claim(&record(false), &call),
            Err(CallError::MalformedArguments(_))
        ));
    }

    #[test]
    fn test_release_admits_custodian() {
        let mut claimed = record(true);
        claimed.custodian_address = BOB;
        claimed.custodian_name = "Bob".into();

        let txn = app_call(BOB, None, &[RELEASE_TAG, b"Bob"]);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(check_release(&claimed, &call), Ok(()));
    }

    #[rstest]
    #[case::wrong_name(BOB, b"Robert")]
    #[case::wrong_caller(CAROL, b"Bob")]
    #[case::both_wrong(CAROL, b"Carol")]
    fn test_release_rejects_non_custodian(#[case] caller: Address, #[case] name: &[u8]) {
        let mut claimed = record(true);
        claimed.custodian_address = BOB;
        claimed.custodian_name = "Bob".into();

        let txn = app_call(caller, None, &[RELEASE_TAG, name]);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert!(matches!(
            check_release(&claimed, &call),
            Err(CallError::AuthorizationFailure(_))
        ));
    }

    #[test]
    fn test_release_rejects_available_listing() {
        let txn = app_call(ALICE, None, &[RELEASE_TAG, b"Alice"]);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(
            check_release(&record(false), &call),
            Err(CallError::WrongLifecycleState("listing is not claimed"))
        );
    }

    #[test]
    fn test_destroy_only_by_creator() {
        let by_alice = app_call(ALICE, None, &[]);
        let members = [&by_alice];
        assert_eq!(
            check_destroy(&params(), &Call::from_members(&members).unwrap()),
            Ok(())
        );

        let by_bob = app_call(BOB, None, &[]);
        let members = [&by_bob];
        assert!(matches!(
            check_destroy(&params(), &Call::from_members(&members).unwrap()),
            Err(CallError::AuthorizationFailure(_))
        ));
    }

    #[test]
    fn test_stale_sequence_rejected() {
        let txn = app_call(BOB, None, &[RELEASE_TAG, b"Bob"]);
        let members = [&txn];
        let call = Call::from_members(&members).unwrap();
        assert_eq!(check_fresh(0, &call), Ok(()));
        assert_eq!(
            check_fresh(3, &call),
            Err(CallError::StaleCall {
                expected: 3,
                got: 0
            })
        );
    }

    #[test]
    fn test_first_member_must_be_a_call() {
        let pay = payment(BOB, ALICE, 1000);
        let members = [&pay];
        assert!(matches!(
            Call::from_members(&members),
            Err(CallError::BundleIntegrityFailure(_))
        ));
        assert!(matches!(
            Call::from_members(&[]),
            Err(CallError::BundleIntegrityFailure(_))
        ));
    }
}
