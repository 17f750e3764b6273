use tracing::debug;

use crate::amount::algos_to_micro;
use crate::domain::{MicroAlgos, NetworkParams, TransactionDraft};
use crate::error::ComposeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeDecision {
    Keep,
    Rebuild { fee: MicroAlgos },
}

pub struct FeeCalculator;

impl FeeCalculator {
    pub fn fee_for_size(params: &NetworkParams, signed_size: usize) -> MicroAlgos {
        let by_size = params
            .fee_per_byte
            .saturating_mul(u64::try_from(signed_size).unwrap_or(u64::MAX));
        MicroAlgos(by_size.max(params.min_fee.0))
    }

    /// Compares the fee implied by the signed size with the fee the record
    /// was composed with. Drafts other than payments always keep their fee.
    pub fn reconcile(
        draft: &TransactionDraft,
        signed_size: usize,
        assumed: MicroAlgos,
        params: &NetworkParams,
    ) -> Result<FeeDecision, ComposeError> {
        let TransactionDraft::Payment(payment) = draft else {
            return Ok(FeeDecision::Keep);
        };
        let fee = Self::fee_for_size(params, signed_size);
        debug!(signed_size, assumed = assumed.0, projected = fee.0, "fee reconciliation");

        if !payment.is_max_transaction {
            let amount = MicroAlgos(algos_to_micro(payment.amount)?);
            let required = amount
                .checked_add(fee)
                .and_then(|x| x.checked_add(payment.from.min_balance))
                .ok_or_else(|| ComposeError::InvalidDraft("amount overflows balance".to_owned()))?;
            if payment.from.balance < required {
                return Err(ComposeError::BelowMinimumAmount {
                    required,
                    shortfall: required.saturating_sub(payment.from.balance),
                });
            }
        } else if payment.from.spendable() < fee {
            let required = payment
                .from
                .min_balance
                .checked_add(fee)
                .ok_or_else(|| ComposeError::InvalidDraft("fee overflows balance".to_owned()))?;
            return Err(ComposeError::BelowMinimumAmount {
                required,
                shortfall: required.saturating_sub(payment.from.balance),
            });
        }

        if fee == assumed {
            Ok(FeeDecision::Keep)
        } else {
            Ok(FeeDecision::Rebuild { fee })
        }
    }
}
