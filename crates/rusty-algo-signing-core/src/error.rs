use thiserror::Error;

use crate::domain::{Address, MicroAlgos};
use crate::state_machine::TransitionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("invalid draft: {0}")]
    InvalidDraft(String),
    #[error("sdk error: {0}")]
    SdkError(String),
    #[error("balance below minimum: {required} required, short by {shortfall}")]
    BelowMinimumAmount {
        required: MicroAlgos,
        shortfall: MicroAlgos,
    },
    #[error("the asset creator cannot opt out of its own asset")]
    OptOutFromCreatorNotAllowed,
    #[error("compose failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("local signing failed: {0}")]
    LocalSigningFailed(String),
    #[error("ledger rejected the transaction")]
    LedgerRejected,
    #[error("ledger connection timed out")]
    LedgerTimeout,
    #[error("ledger address mismatch: expected {expected}, device reported {found}")]
    LedgerAddressMismatch { expected: Address, found: Address },
    #[error("ledger device unreachable: {0}")]
    LedgerDeviceUnreachable(String),
    #[error("ledger is already signing another transaction")]
    LedgerBusy,
    #[error("signing cancelled")]
    Cancelled,
    #[error("transaction {0} is already signed")]
    AlreadySigned(usize),
    #[error("no signer available for {0}")]
    NoSignerForAddress(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connectivity error: {0}")]
    Connectivity(String),
    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// Absent account/resource; callers treat this as "nothing there", not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Api { status: 404, .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("network parameters unavailable: {0}")]
    ParamsFetchFailed(TransportError),
    #[error("upload failed: {0}")]
    UploadFailed(TransportError),
    #[error("transaction {id} rejected by node: {reason}")]
    TransactionRejectedByNode { id: String, reason: String },
    #[error("transaction {id} status unavailable: {source}")]
    StatusFetchFailed { id: String, source: TransportError },
    #[error("transaction {0} not confirmed in time")]
    ConfirmationTimeout(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("run cancelled")]
    Cancelled,
    #[error("submission worker failed: {0}")]
    Worker(String),
}
