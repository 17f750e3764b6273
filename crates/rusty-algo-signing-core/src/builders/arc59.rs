//! Asset inbox router calls: send into an inbox, claim from it, reject it.

use serde_bytes::ByteBuf;

use crate::amount::to_base_units;
use crate::codec::{self, Transaction, TYPE_APPLICATION_CALL, TYPE_ASSET_TRANSFER, TYPE_PAYMENT};
use crate::domain::{
    Account, Address, Arc59ClaimDraft, Arc59RejectDraft, Arc59SendDraft, MicroAlgos,
    NetworkParams, UnsignedTransactionItem,
};
use crate::error::ComposeError;

use super::asset::opt_in_body;
use super::{
    assemble, ensure_affordable, header, require_asset_id, Pending, TransactionDataBuilder,
    ASSET_MIN_BALANCE,
};

pub const OPT_ROUTER_IN: &str = "arc59_optRouterIn(uint64)void";
pub const SEND_ASSET: &str = "arc59_sendAsset(axfer,address,uint64)address";
pub const CLAIM: &str = "arc59_claim(uint64)void";
pub const CLAIM_ALGO: &str = "arc59_claimAlgo()void";
pub const REJECT: &str = "arc59_reject(uint64)void";

/// Inner transactions issued by claim, claimAlgo, reject and optRouterIn.
const SINGLE_INNER: u64 = 1;

fn app_call_fee(params: &NetworkParams, inner: u64) -> MicroAlgos {
    MicroAlgos(params.min_fee.0.saturating_mul(inner.saturating_add(1)))
}

fn method_call(
    params: &NetworkParams,
    sender: &Address,
    app_id: u64,
    method: &str,
    args: Vec<ByteBuf>,
    fee: MicroAlgos,
) -> Transaction {
    let mut txn = header(params, sender, TYPE_APPLICATION_CALL, fee, None);
    txn.apid = app_id;
    txn.apaa = std::iter::once(ByteBuf::from(codec::method_selector(method).to_vec()))
        .chain(args)
        .collect();
    txn
}

fn total_fees(pending: &[Pending]) -> Result<MicroAlgos, ComposeError> {
    pending
        .iter()
        .try_fold(MicroAlgos::ZERO, |acc, p| acc.checked_add(p.fee))
        .ok_or_else(|| ComposeError::InvalidDraft("fees overflow".to_owned()))
}

pub struct Arc59SendBuilder<'a> {
    draft: &'a Arc59SendDraft,
}

impl<'a> Arc59SendBuilder<'a> {
    pub fn new(draft: &'a Arc59SendDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for Arc59SendBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        let s = &d.summary;
        require_asset_id(d.asset.id)?;
        if s.app_id == 0 {
            return Err(ComposeError::InvalidDraft("inbox app id must be set".to_owned()));
        }
        let receiver = d.receiver.resolve()?;
        let inbox: Address = s.inbox_address.parse()?;
        let router = Address::for_application(s.app_id);
        let units = to_base_units(d.amount, d.asset.decimals)?;
        let sender = &d.sender;

        let mut pending = Vec::with_capacity(5);
        let mut batch = 0;

        // The router has to hold the asset before it can accept it.
        if !s.is_arc59_opted_in {
            let mut fund = header(params, &sender.address, TYPE_PAYMENT, params.min_fee, None);
            fund.amt = ASSET_MIN_BALANCE.0;
            fund.rcv = Some(codec::address_bytes(&router));
            pending.push(Pending::from_account(fund, sender, params.min_fee));

            let fee = app_call_fee(params, SINGLE_INNER);
            let mut opt_in = method_call(
                params,
                &sender.address,
                s.app_id,
                OPT_ROUTER_IN,
                vec![codec::abi_uint64(d.asset.id)],
                fee,
            );
            opt_in.apas = vec![d.asset.id];
            pending.push(Pending::from_account(opt_in, sender, fee));
            batch = 1;
        }

        let funding = s
            .minimum_balance_requirement
            .checked_add(s.receiver_algo_needed_for_claim)
            .and_then(|x| x.checked_add(s.protocol_fee))
            .ok_or_else(|| ComposeError::InvalidDraft("inbox funding overflows".to_owned()))?;
        if funding > MicroAlgos::ZERO {
            let mut fund = header(params, &sender.address, TYPE_PAYMENT, params.min_fee, None);
            fund.amt = funding.0;
            fund.rcv = Some(codec::address_bytes(&router));
            pending.push(Pending::from_account(fund, sender, params.min_fee).in_batch(batch));
        }

        let mut transfer = header(
            params,
            &sender.address,
            TYPE_ASSET_TRANSFER,
            params.min_fee,
            d.note.encoded()?,
        );
        transfer.xaid = d.asset.id;
        transfer.aamt = units;
        transfer.arcv = Some(codec::address_bytes(&router));
        pending.push(Pending::from_account(transfer, sender, params.min_fee).in_batch(batch));

        let fee = app_call_fee(params, s.inner_transaction_count);
        let mut send = method_call(
            params,
            &sender.address,
            s.app_id,
            SEND_ASSET,
            vec![
                codec::address_bytes(&receiver),
                codec::abi_uint64(s.receiver_algo_needed_for_claim.0),
            ],
            fee,
        );
        send.apat = vec![codec::address_bytes(&receiver), codec::address_bytes(&inbox)];
        send.apas = vec![d.asset.id];
        pending.push(Pending::from_account(send, sender, fee).in_batch(batch));

        let spend = total_fees(&pending)?
            .checked_add(funding)
            .ok_or_else(|| ComposeError::InvalidDraft("fees overflow".to_owned()))?;
        let router_funding = if s.is_arc59_opted_in {
            MicroAlgos::ZERO
        } else {
            ASSET_MIN_BALANCE
        };
        ensure_affordable(sender, spend, router_funding)?;

        assemble(pending)
    }
}

pub struct Arc59ClaimBuilder<'a> {
    draft: &'a Arc59ClaimDraft,
}

impl<'a> Arc59ClaimBuilder<'a> {
    pub fn new(draft: &'a Arc59ClaimDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for Arc59ClaimBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset.id)?;
        let inbox: Address = d.inbox_address.parse()?;
        let receiver: &Account = &d.receiver;
        let mut pending = Vec::with_capacity(3);

        if !d.is_opted_in {
            let opt_in = opt_in_body(params, receiver, d.asset.id, None);
            pending.push(Pending::from_account(opt_in, receiver, params.min_fee));
        }

        if d.claim_algo {
            let fee = app_call_fee(params, SINGLE_INNER);
            let mut claim_algo =
                method_call(params, &receiver.address, d.app_id, CLAIM_ALGO, Vec::new(), fee);
            claim_algo.apat = vec![codec::address_bytes(&inbox)];
            pending.push(Pending::from_account(claim_algo, receiver, fee));
        }

        let fee = app_call_fee(params, SINGLE_INNER);
        let mut claim = method_call(
            params,
            &receiver.address,
            d.app_id,
            CLAIM,
            vec![codec::abi_uint64(d.asset.id)],
            fee,
        );
        claim.apat = vec![codec::address_bytes(&inbox)];
        claim.apas = vec![d.asset.id];
        pending.push(Pending::from_account(claim, receiver, fee));

        let reserve = if d.is_opted_in {
            MicroAlgos::ZERO
        } else {
            ASSET_MIN_BALANCE
        };
        ensure_affordable(receiver, total_fees(&pending)?, reserve)?;

        assemble(pending)
    }
}

pub struct Arc59RejectBuilder<'a> {
    draft: &'a Arc59RejectDraft,
}

impl<'a> Arc59RejectBuilder<'a> {
    pub fn new(draft: &'a Arc59RejectDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for Arc59RejectBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset.id)?;
        let inbox: Address = d.inbox_address.parse()?;

        let fee = app_call_fee(params, SINGLE_INNER);
        let mut reject = method_call(
            params,
            &d.receiver.address,
            d.app_id,
            REJECT,
            vec![codec::abi_uint64(d.asset.id)],
            fee,
        );
        reject.apat = vec![
            codec::address_bytes(&inbox),
            codec::address_bytes(&d.asset.creator),
        ];
        reject.apas = vec![d.asset.id];
        ensure_affordable(&d.receiver, fee, MicroAlgos::ZERO)?;

        assemble(vec![Pending::from_account(reject, &d.receiver, fee)])
    }
}
