use crate::codec::{self, TYPE_PAYMENT};
use crate::domain::{Address, MicroAlgos, NetworkParams, RekeyDraft, UnsignedTransactionItem};
use crate::error::ComposeError;

use super::{assemble, ensure_affordable, header, Pending, TransactionDataBuilder};

/// Zero payment to self carrying the new authorization address.
pub struct RekeyBuilder<'a> {
    draft: &'a RekeyDraft,
}

impl<'a> RekeyBuilder<'a> {
    pub fn new(draft: &'a RekeyDraft) -> Self {
        Self { draft }
    }
}

impl TransactionDataBuilder for RekeyBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let d = self.draft;
        let target: Address = d.rekey_to.parse()?;
        if target == d.account.signer_address() {
            return Err(ComposeError::InvalidDraft(format!(
                "account is already controlled by {target}"
            )));
        }
        ensure_affordable(&d.account, params.min_fee, MicroAlgos::ZERO)?;

        let mut txn = header(
            params,
            &d.account.address,
            TYPE_PAYMENT,
            params.min_fee,
            d.note.encoded()?,
        );
        txn.rcv = Some(codec::address_bytes(&d.account.address));
        txn.rekey = Some(codec::address_bytes(&target));

        assemble(vec![Pending::from_account(txn, &d.account, params.min_fee)])
    }
}
