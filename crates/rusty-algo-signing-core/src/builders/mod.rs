mod arc59;
mod asset;
mod keyreg;
mod opt_in_and_send;
mod payment;
mod rekey;

pub use arc59::{Arc59ClaimBuilder, Arc59RejectBuilder, Arc59SendBuilder};
pub use asset::{AssetOptInBuilder, AssetOptOutBuilder, AssetTransferBuilder};
pub use keyreg::KeyRegistrationBuilder;
pub use opt_in_and_send::OptInAndSendBuilder;
pub use payment::PaymentBuilder;
pub use rekey::RekeyBuilder;

use serde_bytes::ByteBuf;
use tracing::debug;

use crate::codec::{self, Transaction};
use crate::domain::{
    Account, Address, MicroAlgos, NetworkParams, TransactionDraft, UnsignedTransactionItem,
    MAX_GROUP_SIZE,
};
use crate::error::ComposeError;

pub const VALIDITY_WINDOW: u64 = 1000;
/// Minimum balance each asset holding adds to an account.
pub const ASSET_MIN_BALANCE: MicroAlgos = MicroAlgos(100_000);

pub trait TransactionDataBuilder {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError>;
}

pub fn builder_for(draft: &TransactionDraft) -> Box<dyn TransactionDataBuilder + '_> {
    match draft {
        TransactionDraft::Payment(d) => Box::new(PaymentBuilder::new(d)),
        TransactionDraft::AssetTransfer(d) => Box::new(AssetTransferBuilder::new(d)),
        TransactionDraft::OptIn(d) => Box::new(AssetOptInBuilder::new(d)),
        TransactionDraft::OptOut(d) => Box::new(AssetOptOutBuilder::new(d)),
        TransactionDraft::Rekey(d) => Box::new(RekeyBuilder::new(d)),
        TransactionDraft::KeyRegistration(d) => Box::new(KeyRegistrationBuilder::new(d)),
        TransactionDraft::OptInAndSend(d) => Box::new(OptInAndSendBuilder::new(d)),
        TransactionDraft::Arc59Send(d) => Box::new(Arc59SendBuilder::new(d)),
        TransactionDraft::Arc59Claim(d) => Box::new(Arc59ClaimBuilder::new(d)),
        TransactionDraft::Arc59Reject(d) => Box::new(Arc59RejectBuilder::new(d)),
    }
}

pub fn compose(
    params: &NetworkParams,
    draft: &TransactionDraft,
) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
    let items = builder_for(draft).compose(params)?;
    debug!(kind = ?draft.kind(), count = items.len(), "composed transactions");
    Ok(items)
}

/// A transaction body waiting for group assignment and encoding.
pub(crate) struct Pending {
    pub txn: Transaction,
    pub sender: Address,
    pub signer: Address,
    pub fee: MicroAlgos,
    pub batch: usize,
}

impl Pending {
    pub fn from_account(txn: Transaction, account: &Account, fee: MicroAlgos) -> Self {
        Self {
            txn,
            sender: account.address,
            signer: account.signer_address(),
            fee,
            batch: 0,
        }
    }

    pub fn in_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }
}

pub(crate) fn header(
    params: &NetworkParams,
    sender: &Address,
    tx_type: &str,
    fee: MicroAlgos,
    note: Option<Vec<u8>>,
) -> Transaction {
    Transaction {
        fee: fee.0,
        fv: params.last_round,
        lv: params.last_round.saturating_add(VALIDITY_WINDOW),
        gen: params.genesis_id.clone(),
        gh: Some(ByteBuf::from(params.genesis_hash.to_vec())),
        note: note.map(ByteBuf::from),
        snd: codec::address_bytes(sender),
        tx_type: tx_type.to_owned(),
        ..Transaction::default()
    }
}

pub(crate) fn require_asset_id(asset_id: u64) -> Result<(), ComposeError> {
    if asset_id == 0 {
        return Err(ComposeError::InvalidDraft("asset id must be set".to_owned()));
    }
    Ok(())
}

/// Fails unless `account` can pay `spend` and stay above its minimum balance
/// plus `extra_reserve`.
pub(crate) fn ensure_affordable(
    account: &Account,
    spend: MicroAlgos,
    extra_reserve: MicroAlgos,
) -> Result<(), ComposeError> {
    let required = account
        .min_balance
        .checked_add(extra_reserve)
        .and_then(|x| x.checked_add(spend))
        .ok_or_else(|| ComposeError::InvalidDraft("amount overflows balance".to_owned()))?;
    if account.balance < required {
        return Err(ComposeError::BelowMinimumAmount {
            required,
            shortfall: required.saturating_sub(account.balance),
        });
    }
    Ok(())
}

/// Assigns group ids per batch, encodes, and tags each body with its txid.
pub(crate) fn assemble(pending: Vec<Pending>) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
    let mut pending = pending;
    let batches = pending.iter().map(|p| p.batch).max().map_or(0, |m| m + 1);

    for batch in 0..batches {
        let members: Vec<usize> = (0..pending.len())
            .filter(|&i| pending[i].batch == batch)
            .collect();
        if members.len() > MAX_GROUP_SIZE {
            return Err(ComposeError::InvalidDraft(format!(
                "group of {} exceeds {MAX_GROUP_SIZE} transactions",
                members.len()
            )));
        }
        if members.len() < 2 {
            continue;
        }
        let mut raw_ids = Vec::with_capacity(members.len());
        for &i in &members {
            pending[i].txn.grp = None;
            let raw = codec::encode_transaction(&pending[i].txn)?;
            raw_ids.push(codec::raw_transaction_id(&raw));
        }
        let gid = codec::group_id(&raw_ids);
        for &i in &members {
            pending[i].txn.grp = Some(ByteBuf::from(gid.to_vec()));
        }
    }

    pending
        .into_iter()
        .map(|p| {
            let raw_bytes = codec::encode_transaction(&p.txn)?;
            Ok(UnsignedTransactionItem {
                sender: p.sender,
                signer: p.signer,
                txid: codec::transaction_id(&raw_bytes),
                raw_bytes,
                group_index: p.batch,
                fee: p.fee,
            })
        })
        .collect()
}
