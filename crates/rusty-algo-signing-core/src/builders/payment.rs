use crate::amount::algos_to_micro;
use crate::codec::{self, Transaction, TYPE_PAYMENT};
use crate::domain::{Address, MicroAlgos, NetworkParams, PaymentDraft, UnsignedTransactionItem};
use crate::error::ComposeError;
use crate::fee::FeeCalculator;

use super::{assemble, ensure_affordable, header, Pending, TransactionDataBuilder};

pub struct PaymentBuilder<'a> {
    draft: &'a PaymentDraft,
}

impl<'a> PaymentBuilder<'a> {
    pub fn new(draft: &'a PaymentDraft) -> Self {
        Self { draft }
    }

    fn amount(&self, fee: MicroAlgos) -> Result<MicroAlgos, ComposeError> {
        let from = &self.draft.from;
        if self.draft.is_max_transaction {
            ensure_affordable(from, fee, MicroAlgos::ZERO)?;
            return Ok(from.spendable().saturating_sub(fee));
        }
        let amount = MicroAlgos(algos_to_micro(self.draft.amount)?);
        let spend = amount
            .checked_add(fee)
            .ok_or_else(|| ComposeError::InvalidDraft("amount overflows balance".to_owned()))?;
        ensure_affordable(from, spend, MicroAlgos::ZERO)?;
        Ok(amount)
    }

    fn body(
        &self,
        params: &NetworkParams,
        receiver: &Address,
        fee: MicroAlgos,
    ) -> Result<Transaction, ComposeError> {
        let mut txn = header(
            params,
            &self.draft.from.address,
            TYPE_PAYMENT,
            fee,
            self.draft.note.encoded()?,
        );
        txn.amt = self.amount(fee)?.0;
        txn.rcv = Some(codec::address_bytes(receiver));
        Ok(txn)
    }
}

impl TransactionDataBuilder for PaymentBuilder<'_> {
    fn compose(&self, params: &NetworkParams) -> Result<Vec<UnsignedTransactionItem>, ComposeError> {
        let receiver = self.draft.to.resolve()?;
        let fee = match self.draft.fee {
            Some(fee) => fee,
            None => {
                let probe = self.body(params, &receiver, params.min_fee)?;
                let raw = codec::encode_transaction(&probe)?;
                let rekeyed = self.draft.from.auth_address.is_some();
                FeeCalculator::fee_for_size(params, codec::estimate_signed_size(&raw, rekeyed))
            }
        };
        let txn = self.body(params, &receiver, fee)?;

        assemble(vec![Pending::from_account(txn, &self.draft.from, fee)])
    }
}
