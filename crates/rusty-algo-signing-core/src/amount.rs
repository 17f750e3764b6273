use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::ComposeError;

const MAX_DECIMALS: u32 = 19;

/// Converts a user-entered amount to integer base units. Fractions finer than
/// `decimals` are refused rather than rounded.
pub fn to_base_units(amount: Decimal, decimals: u32) -> Result<u64, ComposeError> {
    if decimals > MAX_DECIMALS {
        return Err(ComposeError::InvalidDraft(format!(
            "asset decimals {decimals} out of range"
        )));
    }
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ComposeError::InvalidDraft(
            "amount must not be negative".to_owned(),
        ));
    }
    let scale = Decimal::from(10u64.pow(decimals));
    let scaled = amount
        .checked_mul(scale)
        .ok_or_else(|| ComposeError::InvalidDraft("amount overflows base units".to_owned()))?;
    if !scaled.fract().is_zero() {
        return Err(ComposeError::InvalidDraft(format!(
            "amount has more than {decimals} fractional digits"
        )));
    }
    scaled
        .trunc()
        .to_u64()
        .ok_or_else(|| ComposeError::InvalidDraft("amount overflows base units".to_owned()))
}

pub fn from_base_units(units: u64, decimals: u32) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(units), decimals.min(MAX_DECIMALS))
}

pub fn algos_to_micro(amount: Decimal) -> Result<u64, ComposeError> {
    to_base_units(amount, crate::domain::ALGO_DECIMALS)
}
