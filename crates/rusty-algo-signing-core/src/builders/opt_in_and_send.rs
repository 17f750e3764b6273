use crate::amount::to_base_units;
use crate::codec::{self, TYPE_ASSET_TRANSFER};
use crate::domain::{MicroAlgos, NetworkParams, OptInAndSendDraft, UnsignedTransactionItem};
use crate::error::ComposeError;

use super::asset::opt_in_body;
use super::{
    assemble, ensure_affordable, header, require_asset_id, Pending, TransactionDataBuilder,
    ASSET_MIN_BALANCE,
};

/// Receiver opt-in followed by the transfer, as one atomic group. Both
/// accounts are held by this wallet and each signs its own member.
pub struct OptInAndSendBuilder<'a> {
    draft: &'a OptInAndSendDraft,
}

impl<'a> OptInAndSendBuilder<'a> {
    pub fn new(draft: &'a OptInAndSendDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for OptInAndSendBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        require_asset_id(d.asset.id)?;
        if d.sender.address == d.receiver.address {
            return Err(ComposeError::InvalidDraft(
                "sender and receiver must differ".to_owned(),
            ));
        }
        let units = to_base_units(d.amount, d.asset.decimals)?;
        ensure_affordable(&d.receiver, params.min_fee, ASSET_MIN_BALANCE)?;
        ensure_affordable(&d.sender, params.min_fee, MicroAlgos::ZERO)?;

        let opt_in = opt_in_body(params, &d.receiver, d.asset.id, None);

        let mut transfer = header(
            params,
            &d.sender.address,
            TYPE_ASSET_TRANSFER,
            params.min_fee,
            d.note.encoded()?,
        );
        transfer.xaid = d.asset.id;
        transfer.aamt = units;
        transfer.arcv = Some(codec::address_bytes(&d.receiver.address));

        assemble(vec![
            Pending::from_account(opt_in, &d.receiver, params.min_fee),
            Pending::from_account(transfer, &d.sender, params.min_fee),
        ])
    }
}
