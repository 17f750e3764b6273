use serde_bytes::ByteBuf;

use crate::codec::TYPE_KEY_REGISTRATION;
use crate::domain::{
    KeyRegistration, KeyRegistrationDraft, MicroAlgos, NetworkParams, UnsignedTransactionItem,
};
use crate::error::ComposeError;

use super::{assemble, ensure_affordable, header, Pending, TransactionDataBuilder};

pub struct KeyRegistrationBuilder<'a> {
    draft: &'a KeyRegistrationDraft,
}

impl<'a> KeyRegistrationBuilder<'a> {
    pub fn new(draft: &'a KeyRegistrationDraft) -> Self {
        Self { draft }
    }

    /// A custom fee is honoured for online registration only.
    fn fee(&self, params: &NetworkParams) -> MicroAlgos {
        match (&self.draft.registration, self.draft.fee) {
            (KeyRegistration::Online(_), Some(fee)) => fee.max(params.min_fee),
            _ => params.min_fee,
        }
    }
}

impl TransactionDataBuilder for KeyRegistrationBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        let fee = self.fee(params);
        ensure_affordable(&d.account, fee, MicroAlgos::ZERO)?;

        let mut txn = header(
            params,
            &d.account.address,
            TYPE_KEY_REGISTRATION,
            fee,
            d.note.encoded()?,
        );
        if let KeyRegistration::Online(keys) = &d.registration {
            txn.votekey = Some(ByteBuf::from(keys.vote_key.to_vec()));
            txn.selkey = Some(ByteBuf::from(keys.selection_key.to_vec()));
            txn.sprfkey = Some(ByteBuf::from(keys.state_proof_key.to_vec()));
            txn.votefst = keys.vote_first;
            txn.votelst = keys.vote_last;
            txn.votekd = keys.key_dilution;
        }

        assemble(vec![Pending::from_account(txn, &d.account, fee)])
    }
}
