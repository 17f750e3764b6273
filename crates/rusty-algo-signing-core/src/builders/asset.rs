use crate::amount::to_base_units;
use crate::codec::{self, Transaction, TYPE_ASSET_TRANSFER};
use crate::domain::{
    Account, Address, AssetOptInDraft, AssetOptOutDraft, AssetTransferDraft, MicroAlgos,
    NetworkParams, UnsignedTransactionItem,
};
use crate::error::ComposeError;

use super::{
    assemble, ensure_affordable, header, require_asset_id, Pending, TransactionDataBuilder,
    ASSET_MIN_BALANCE,
};

pub struct AssetTransferBuilder<'a> {
    draft: &'a AssetTransferDraft,
}

impl<'a> AssetTransferBuilder<'a> {
    pub fn new(draft: &'a AssetTransferDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for AssetTransferBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset.id)?;
        let receiver = d.to.resolve()?;
        let close_to = d
            .close_to
            .as_deref()
            .map(str::parse::<Address>)
            .transpose()?;
        let units = to_base_units(d.amount, d.asset.decimals)?;
        ensure_affordable(&d.from, params.min_fee, MicroAlgos::ZERO)?;

        let mut txn = header(
            params,
            &d.from.address,
            TYPE_ASSET_TRANSFER,
            params.min_fee,
            d.note.encoded()?,
        );
        txn.xaid = d.asset.id;
        txn.aamt = units;
        txn.arcv = Some(codec::address_bytes(&receiver));
        txn.aclose = close_to.as_ref().map(codec::address_bytes);

        assemble(vec![Pending::from_account(txn, &d.from, params.min_fee)])
    }
}

/// Zero-amount transfer to self that adds the asset holding.
pub(crate) fn opt_in_body(
    params: &NetworkParams,
    account: &Account,
    asset_id: u64,
    note: Option<Vec<u8>>,
) -> Transaction {
    let mut txn = header(
        params,
        &account.address,
        TYPE_ASSET_TRANSFER,
        params.min_fee,
        note,
    );
    txn.xaid = asset_id;
    txn.arcv = Some(codec::address_bytes(&account.address));
    txn
}

pub struct AssetOptInBuilder<'a> {
    draft: &'a AssetOptInDraft,
}

impl<'a> AssetOptInBuilder<'a> {
    pub fn new(draft: &'a AssetOptInDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for AssetOptInBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset_id)?;
        ensure_affordable(&d.account, params.min_fee, ASSET_MIN_BALANCE)?;

        let txn = opt_in_body(params, &d.account, d.asset_id, d.note.encoded()?);
        assemble(vec![Pending::from_account(txn, &d.account, params.min_fee)])
    }
}

pub struct AssetOptOutBuilder<'a> {
    draft: &'a AssetOptOutDraft,
}

impl<'a> AssetOptOutBuilder<'a> {
    pub fn new(draft: &'a AssetOptOutDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for AssetOptOutBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset.id)?;
        if d.account.address == d.asset.creator {
            return Err(ComposeError::OptOutFromCreatorNotAllowed);
        }
        ensure_affordable(&d.account, params.min_fee, MicroAlgos::ZERO)?;

        let creator = codec::address_bytes(&d.asset.creator);
        let mut txn = header(
            params,
            &d.account.address,
            TYPE_ASSET_TRANSFER,
            params.min_fee,
            None,
        );
        txn.xaid = d.asset.id;
        txn.arcv = Some(creator.clone());
        txn.aclose = Some(creator);

        assemble(vec![Pending::from_account(txn, &d.account, params.min_fee)])
    }
}
