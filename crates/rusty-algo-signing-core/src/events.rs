use tokio::sync::mpsc;

use crate::domain::{MicroAlgos, SigningOutcome};
use crate::state_machine::{LedgerStatus, RunStatus, StateTransition};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    DeviceFound { name: String },
    ApprovalRequested { device_name: String },
    SignatureReceived,
    Rejected,
    TimedOut,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent {
    RunStateChanged(StateTransition<RunStatus>),
    LedgerStateChanged(StateTransition<LedgerStatus>),
    Ledger { index: usize, event: LedgerEvent },
    Signing { index: usize, outcome: SigningOutcome },
    FeeRecalculated {
        previous: MicroAlgos,
        updated: MicroAlgos,
        signed_size: usize,
    },
    Submitted { batch: usize, txid: String },
    Confirmed { txid: String, round: u64 },
    GroupAborted { failed_batch: usize, skipped: usize },
}

/// Producer half of the single-consumer event stream. A dropped consumer
/// silences emission instead of failing the run.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<TransactionEvent>>,
}

impl EventSink {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: TransactionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

pub fn event_channel() -> (EventSink, mpsc::UnboundedReceiver<TransactionEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx: Some(tx) }, rx)
}
