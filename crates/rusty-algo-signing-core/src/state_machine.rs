use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Idle,
    FetchingParams,
    Composing,
    Signing,
    FeeReconciliation,
    AllSigned,
    Uploading,
    Confirming,
    Completed,
    ComposeFailed,
    SignFailed,
    UploadFailed,
    TransactionRejected,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::ComposeFailed
                | RunStatus::SignFailed
                | RunStatus::UploadFailed
                | RunStatus::TransactionRejected
                | RunStatus::Cancelled
        )
    }

    /// Past this point the payload may already be on the network.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            RunStatus::FetchingParams
                | RunStatus::Composing
                | RunStatus::Signing
                | RunStatus::FeeReconciliation
                | RunStatus::AllSigned
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Start,
    SignOnly,
    ParamsFetched,
    Composed,
    Reconcile,
    FeeAccepted,
    Recompose,
    AllSigned,
    Upload,
    AwaitConfirmation,
    Complete,
    ComposeFailure,
    SignFailure,
    UploadFailure,
    Reject,
    Cancel,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Idle,
    Scanning,
    Connected,
    AwaitingSignature,
    SignatureReceived,
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerAction {
    Scan,
    Connect,
    RequestSignature,
    ReceiveSignature,
    Reject,
    Timeout,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition<S> {
    pub from: S,
    pub to: S,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("illegal run transition: {from:?} --{action:?}-->")]
    Run { from: RunStatus, action: RunAction },
    #[error("illegal ledger transition: {from:?} --{action:?}-->")]
    Ledger {
        from: LedgerStatus,
        action: LedgerAction,
    },
}

pub fn run_transition(
    from: RunStatus,
    action: RunAction,
) -> Result<(RunStatus, StateTransition<RunStatus>), TransitionError> {
    use RunAction as A;
    use RunStatus as S;

    let (to, reason) = match (from, action) {
        (S::Idle, A::Start) => (S::FetchingParams, "run started"),
        (S::Idle, A::SignOnly) => (S::Signing, "external payload signing"),
        (S::FetchingParams, A::ParamsFetched) => (S::Composing, "network params ready"),
        (S::Composing, A::Composed) => (S::Signing, "transactions composed"),
        (S::Signing, A::Reconcile) => (S::FeeReconciliation, "first payment signed"),
        (S::FeeReconciliation, A::FeeAccepted) => (S::Signing, "fee confirmed"),
        (S::FeeReconciliation, A::Recompose) => (S::Composing, "fee changed"),
        (S::Signing, A::AllSigned) => (S::AllSigned, "every record signed"),
        (S::AllSigned, A::Upload) => (S::Uploading, "payload submitted"),
        (S::Uploading, A::AwaitConfirmation) => (S::Confirming, "awaiting confirmation"),
        (S::Uploading | S::Confirming | S::AllSigned, A::Complete) => {
            (S::Completed, "run completed")
        }
        (S::FetchingParams | S::Composing | S::FeeReconciliation, A::ComposeFailure) => {
            (S::ComposeFailed, "compose failed")
        }
        (S::Signing, A::SignFailure) => (S::SignFailed, "signing failed"),
        (S::Uploading | S::Confirming, A::UploadFailure) => (S::UploadFailed, "upload failed"),
        (S::Confirming, A::Reject) => (S::TransactionRejected, "rejected by node"),
        (s, A::Cancel) if s.is_cancellable() => (S::Cancelled, "cancelled by caller"),
        (s, A::Reset) if s.is_terminal() || s == S::Idle => (S::Idle, "reset"),
        _ => return Err(TransitionError::Run { from, action }),
    };

    Ok((to, StateTransition { from, to, reason }))
}

pub fn ledger_transition(
    from: LedgerStatus,
    action: LedgerAction,
) -> Result<(LedgerStatus, StateTransition<LedgerStatus>), TransitionError> {
    use LedgerAction as A;
    use LedgerStatus as S;

    let (to, reason) = match (from, action) {
        (S::Idle, A::Scan) => (S::Scanning, "scan started"),
        (S::Scanning, A::Connect) => (S::Connected, "device connected"),
        (S::Connected, A::RequestSignature) => (S::AwaitingSignature, "approval requested"),
        (S::AwaitingSignature, A::ReceiveSignature) => (S::SignatureReceived, "signature received"),
        (S::AwaitingSignature, A::Reject) => (S::Rejected, "user rejected"),
        (S::Scanning | S::Connected | S::AwaitingSignature, A::Timeout) => {
            (S::TimedOut, "watchdog fired")
        }
        (_, A::Reset) => (S::Idle, "bridge released"),
        _ => return Err(TransitionError::Ledger { from, action }),
    };

    Ok((to, StateTransition { from, to, reason }))
}
