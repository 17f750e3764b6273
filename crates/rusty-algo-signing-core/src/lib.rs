pub mod amount;
pub mod builders;
pub mod codec;
pub mod confirmation;
pub mod domain;
pub mod error;
pub mod events;
pub mod fee;
pub mod gate;
pub mod ledger;
pub mod orchestrator;
pub mod ports;
pub mod signer;
pub mod state_machine;

pub use confirmation::{BatchReport, ConfirmationMonitor, ConfirmationSettings, GroupJob};
pub use domain::{
    Account, Address, Arc59ClaimDraft, Arc59RejectDraft, Arc59SendDraft, Arc59SendSummary,
    AssetInfo, AssetOptInDraft, AssetOptOutDraft, AssetTransferDraft, Contact, DraftKind,
    DraftNote, KeyRegistration, KeyRegistrationDraft, MicroAlgos, NetworkParams, OnlineKeys,
    OptInAndSendDraft, PaymentDraft, PendingTransaction, Recipient, RekeyDraft, SigningFlow,
    SigningOutcome, TransactionDraft, TransactionRecord, UnsignedTransactionItem,
};
pub use error::{ComposeError, NetworkError, SignError, TransactionError, TransportError};
pub use events::{event_channel, EventSink, LedgerEvent, TransactionEvent};
pub use fee::{FeeCalculator, FeeDecision};
pub use gate::{GateGuard, GateTicket, SigningRequestGate};
pub use ledger::{LedgerBridge, LedgerDevice, LedgerSignRequest, LedgerTransport};
pub use orchestrator::{OrchestratorSettings, RunReport, TransactionOrchestrator};
pub use ports::{
    Arc59InboxPort, Arc59InboxRequest, PortError, SignerResolver, SubmissionGateway,
    WalletConnectPort,
};
pub use signer::{LedgerSigner, LocalSigner, Signable, SigningContext};
pub use state_machine::{
    ledger_transition, run_transition, LedgerAction, LedgerStatus, RunAction, RunStatus,
    StateTransition, TransitionError,
};

pub use tokio_util::sync::CancellationToken;
