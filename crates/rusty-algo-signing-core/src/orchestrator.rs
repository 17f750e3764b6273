use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::builders;
use crate::codec;
use crate::confirmation::{submit_dependent, ConfirmationSettings, GroupJob};
use crate::domain::{
    MicroAlgos, SigningFlow, SigningOutcome, TransactionDraft, TransactionRecord,
    UnsignedTransactionItem,
};
use crate::error::{ComposeError, NetworkError, SignError, TransactionError};
use crate::events::{EventSink, TransactionEvent};
use crate::fee::{FeeCalculator, FeeDecision};
use crate::ledger::LedgerBridge;
use crate::ports::{SignerResolver, SubmissionGateway};
use crate::signer::SigningContext;
use crate::state_machine::{run_transition, RunAction, RunStatus, TransitionError};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub standard_watchdog: Duration,
    pub wallet_connect_watchdog: Duration,
    pub inbox_watchdog: Duration,
    pub max_fee_rounds: usize,
    pub confirmation: ConfirmationSettings,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            standard_watchdog: Duration::from_secs(20),
            wallet_connect_watchdog: Duration::from_secs(50),
            inbox_watchdog: Duration::from_secs(50),
            max_fee_rounds: 2,
            confirmation: ConfirmationSettings::default(),
        }
    }
}

impl OrchestratorSettings {
    pub fn watchdog(&self, flow: SigningFlow) -> Duration {
        match flow {
            SigningFlow::Standard => self.standard_watchdog,
            SigningFlow::WalletConnect => self.wallet_connect_watchdog,
            SigningFlow::Inbox => self.inbox_watchdog,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Id returned by the node for the first uploaded blob.
    pub txid: String,
    pub transaction_ids: Vec<String>,
    pub fee: MicroAlgos,
    pub confirmed_round: Option<u64>,
}

/// Cancels a run whose future is dropped before it reports an outcome.
struct RunGuard<'a, G, R>
where
    G: SubmissionGateway + 'static,
    R: SignerResolver,
{
    orchestrator: &'a TransactionOrchestrator<G, R>,
    finished: bool,
}

impl<'a, G, R> RunGuard<'a, G, R>
where
    G: SubmissionGateway + 'static,
    R: SignerResolver,
{
    fn new(orchestrator: &'a TransactionOrchestrator<G, R>) -> Self {
        Self {
            orchestrator,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl<G, R> Drop for RunGuard<'_, G, R>
where
    G: SubmissionGateway + 'static,
    R: SignerResolver,
{
    fn drop(&mut self) {
        if !self.finished {
            self.orchestrator.abandon();
        }
    }
}

#[derive(Debug)]
struct RunState {
    status: RunStatus,
    records: Vec<TransactionRecord>,
}

pub struct TransactionOrchestrator<G, R> {
    pub gateway: Arc<G>,
    pub signers: R,
    settings: OrchestratorSettings,
    events: EventSink,
    ledger: Option<Arc<LedgerBridge>>,
    state: Mutex<RunState>,
}

impl<G, R> TransactionOrchestrator<G, R>
where
    G: SubmissionGateway + 'static,
    R: SignerResolver,
{
    pub fn new(gateway: Arc<G>, signers: R, settings: OrchestratorSettings, events: EventSink) -> Self {
        Self {
            gateway,
            signers,
            settings,
            events,
            ledger: None,
            state: Mutex::new(RunState {
                status: RunStatus::Idle,
                records: Vec::new(),
            }),
        }
    }

    pub fn with_ledger(mut self, bridge: Arc<LedgerBridge>) -> Self {
        self.ledger = Some(bridge);
        self
    }

    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    pub fn records(&self) -> Vec<TransactionRecord> {
        self.lock().records.clone()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, action: RunAction) -> Result<(), TransitionError> {
        let mut state = self.lock();
        let (next, transition) = run_transition(state.status, action)?;
        state.status = next;
        drop(state);
        info!(from = ?transition.from, to = ?transition.to, reason = transition.reason, "run state");
        self.events.emit(TransactionEvent::RunStateChanged(transition));
        Ok(())
    }

    /// Clears a finished run so the next one starts from `Idle`.
    pub async fn reset(&self) -> Result<(), TransitionError> {
        self.advance(RunAction::Reset)?;
        self.lock().records.clear();
        self.release_ledger().await;
        Ok(())
    }

    async fn release_ledger(&self) {
        if let Some(bridge) = &self.ledger {
            bridge.reset(&self.events).await;
        }
    }

    /// The caller stopped polling a run mid-flight.
    fn abandon(&self) {
        let status = self.status();
        if status.is_terminal() || status == RunStatus::Idle {
            return;
        }
        warn!(?status, "transaction run dropped before finishing");
        if let Err(err) = self.advance(RunAction::Cancel) {
            let fallback = match status {
                RunStatus::Uploading | RunStatus::Confirming => RunStatus::UploadFailed,
                _ => RunStatus::Cancelled,
            };
            debug!(error = %err, ?fallback, "abandoned run outside transition table");
            self.lock().status = fallback;
        }
        self.lock().records.clear();
        if let Some(bridge) = &self.ledger {
            bridge.release(&self.events);
        }
    }

    fn prepare(&self) -> Result<(), TransitionError> {
        let status = self.status();
        if status.is_terminal() {
            self.advance(RunAction::Reset)?;
            self.lock().records.clear();
        } else if status != RunStatus::Idle {
            return Err(TransitionError::Run {
                from: status,
                action: RunAction::Start,
            });
        }
        Ok(())
    }

    pub async fn run(
        &self,
        draft: TransactionDraft,
        cancel: CancellationToken,
    ) -> Result<RunReport, TransactionError> {
        self.prepare()?;
        self.advance(RunAction::Start)?;
        let guard = RunGuard::new(self);
        info!(kind = ?draft.kind(), sender = %draft.sender().address, "transaction run started");

        let mut draft = draft;
        let result = self.execute(&mut draft, &cancel).await;
        guard.finish();
        if let Err(err) = &result {
            self.fail(err);
            self.release_ledger().await;
        }
        result
    }

    async fn execute(
        &self,
        draft: &mut TransactionDraft,
        cancel: &CancellationToken,
    ) -> Result<RunReport, TransactionError> {
        let params = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransactionError::Cancelled),
            fetched = self.gateway.fetch_params() => fetched.map_err(NetworkError::ParamsFetchFailed)?,
        };
        self.advance(RunAction::ParamsFetched)?;

        let flow = draft.signing_flow();
        let mut seen_size = None;
        let mut rounds = 0;
        let items = 'compose: loop {
            let items = builders::compose(&params, draft)?;
            self.install(&items);
            self.advance(RunAction::Composed)?;

            for (index, item) in items.iter().enumerate() {
                let signed_size = self.sign_record(index, item, flow, cancel).await?;
                if index != 0 || !draft.reconciles_fee() {
                    continue;
                }
                self.advance(RunAction::Reconcile)?;
                match FeeCalculator::reconcile(draft, signed_size, item.fee, &params)? {
                    FeeDecision::Rebuild { fee }
                        if seen_size != Some(signed_size) && rounds < self.settings.max_fee_rounds =>
                    {
                        info!(previous = item.fee.0, updated = fee.0, signed_size, "fee changed, recomposing");
                        self.events.emit(TransactionEvent::FeeRecalculated {
                            previous: item.fee,
                            updated: fee,
                            signed_size,
                        });
                        seen_size = Some(signed_size);
                        rounds += 1;
                        draft.set_fee_override(fee);
                        self.advance(RunAction::Recompose)?;
                        continue 'compose;
                    }
                    FeeDecision::Rebuild { fee } => {
                        warn!(fee = fee.0, signed_size, "fee did not settle, keeping last composition");
                        self.advance(RunAction::FeeAccepted)?;
                    }
                    FeeDecision::Keep => self.advance(RunAction::FeeAccepted)?,
                }
            }
            break items;
        };

        self.advance(RunAction::AllSigned)?;
        let jobs = self.signed_batches(&items)?;
        if cancel.is_cancelled() {
            return Err(TransactionError::Cancelled);
        }
        self.advance(RunAction::Upload)?;

        let transaction_ids: Vec<String> = items.iter().map(|x| x.txid.clone()).collect();
        let fee = items
            .iter()
            .fold(MicroAlgos::ZERO, |acc, x| MicroAlgos(acc.0.saturating_add(x.fee.0)));

        if draft.requires_confirmation() {
            self.advance(RunAction::AwaitConfirmation)?;
            let reports = submit_dependent(
                Arc::clone(&self.gateway),
                self.settings.confirmation,
                jobs,
                self.events.clone(),
            )
            .await?;
            self.advance(RunAction::Complete)?;
            let first = reports.first();
            return Ok(RunReport {
                txid: first.map(|x| x.txid.clone()).unwrap_or_default(),
                transaction_ids,
                fee,
                confirmed_round: reports.last().map(|x| x.confirmed_round),
            });
        }

        let mut uploaded = Vec::with_capacity(jobs.len());
        for job in jobs {
            let txid = self
                .gateway
                .submit(&job.payload)
                .await
                .map_err(NetworkError::UploadFailed)?;
            info!(batch = job.batch, txid = %txid, "payload uploaded");
            self.events.emit(TransactionEvent::Submitted {
                batch: job.batch,
                txid: txid.clone(),
            });
            uploaded.push(txid);
        }
        self.advance(RunAction::Complete)?;
        Ok(RunReport {
            txid: uploaded.into_iter().next().unwrap_or_default(),
            transaction_ids,
            fee,
            confirmed_round: None,
        })
    }

    /// Signs dApp-supplied transactions with the wallet's signers and returns
    /// the signed blobs in input order without uploading them.
    pub async fn sign_external(
        &self,
        unsigned: &[Vec<u8>],
        flow: SigningFlow,
        cancel: CancellationToken,
    ) -> Result<Vec<Vec<u8>>, TransactionError> {
        let items = unsigned
            .iter()
            .map(|raw| self.external_item(raw))
            .collect::<Result<Vec<_>, ComposeError>>()?;
        if items.is_empty() {
            return Err(ComposeError::InvalidDraft("no transactions to sign".to_owned()).into());
        }

        self.prepare()?;
        self.advance(RunAction::SignOnly)?;
        let guard = RunGuard::new(self);
        let result = async {
            self.install(&items);
            for (index, item) in items.iter().enumerate() {
                self.sign_record(index, item, flow, &cancel).await?;
            }
            self.advance(RunAction::AllSigned)?;
            let signed = self
                .lock()
                .records
                .iter()
                .map(|r| r.signed_bytes.clone().unwrap_or_default())
                .collect();
            self.advance(RunAction::Complete)?;
            Ok::<_, TransactionError>(signed)
        }
        .await;
        guard.finish();

        if let Err(err) = &result {
            self.fail(err);
            self.release_ledger().await;
        }
        result
    }

    fn external_item(&self, raw: &[u8]) -> Result<UnsignedTransactionItem, ComposeError> {
        let txn = codec::decode_transaction(raw)?;
        let sender = txn.sender()?;
        let signer = self.signers.auth_address_of(&sender).unwrap_or(sender);
        Ok(UnsignedTransactionItem {
            sender,
            signer,
            raw_bytes: raw.to_vec(),
            group_index: 0,
            txid: codec::transaction_id(raw),
            fee: MicroAlgos(txn.fee),
        })
    }

    fn install(&self, items: &[UnsignedTransactionItem]) {
        self.lock().records = items
            .iter()
            .enumerate()
            .map(|(i, item)| TransactionRecord::from_item(i, item))
            .collect();
    }

    async fn sign_record(
        &self,
        index: usize,
        item: &UnsignedTransactionItem,
        flow: SigningFlow,
        cancel: &CancellationToken,
    ) -> Result<usize, TransactionError> {
        if cancel.is_cancelled() {
            return Err(TransactionError::Cancelled);
        }
        let signer = self
            .signers
            .signer_for(&item.signer)
            .ok_or(SignError::NoSignerForAddress(item.signer))?;
        let ctx = SigningContext {
            index,
            flow,
            watchdog: self.settings.watchdog(flow),
            cancel: cancel.clone(),
            events: self.events.clone(),
        };
        info!(index, txid = %item.txid, hardware = signer.is_hardware(), "signing record");

        match signer.sign(item, &ctx).await {
            Ok(signed) => {
                let size = signed.len();
                {
                    let mut state = self.lock();
                    let record = state.records.get_mut(index).ok_or_else(|| {
                        TransactionError::Worker(format!("record {index} missing"))
                    })?;
                    record.attach_signature(signed.clone())?;
                }
                self.events.emit(TransactionEvent::Signing {
                    index,
                    outcome: SigningOutcome::Success(signed),
                });
                Ok(size)
            }
            Err(err) => {
                let outcome = match &err {
                    SignError::LedgerRejected => SigningOutcome::LedgerRejected,
                    SignError::LedgerTimeout => SigningOutcome::LedgerTimedOut,
                    other => SigningOutcome::Failure(other.clone()),
                };
                self.events.emit(TransactionEvent::Signing { index, outcome });
                Err(err.into())
            }
        }
    }

    /// Concatenates signed records per upload batch, in record order.
    fn signed_batches(&self, items: &[UnsignedTransactionItem]) -> Result<Vec<GroupJob>, TransactionError> {
        let state = self.lock();
        let mut jobs: Vec<GroupJob> = Vec::new();
        for (record, item) in state.records.iter().zip(items) {
            let signed = record.signed_bytes.as_deref().ok_or_else(|| {
                TransactionError::Worker(format!("record {} reached upload unsigned", record.index))
            })?;
            match jobs.last_mut() {
                Some(job) if job.batch == item.group_index => job.payload.extend_from_slice(signed),
                _ => jobs.push(GroupJob {
                    batch: item.group_index,
                    payload: signed.to_vec(),
                }),
            }
        }
        Ok(jobs)
    }

    fn fail(&self, err: &TransactionError) {
        let action = match err {
            TransactionError::Compose(_) | TransactionError::Network(NetworkError::ParamsFetchFailed(_)) => {
                RunAction::ComposeFailure
            }
            TransactionError::Cancelled | TransactionError::Sign(SignError::Cancelled) => RunAction::Cancel,
            TransactionError::Sign(_) => RunAction::SignFailure,
            TransactionError::Network(NetworkError::TransactionRejectedByNode { .. }) => RunAction::Reject,
            TransactionError::Network(_) | TransactionError::Worker(_) => RunAction::UploadFailure,
            TransactionError::Transition(_) => RunAction::Cancel,
        };

        let status = self.status();
        if let Err(transition_err) = self.advance(action) {
            let fallback = match status {
                RunStatus::Uploading | RunStatus::Confirming => RunStatus::UploadFailed,
                RunStatus::Signing | RunStatus::AllSigned => RunStatus::SignFailed,
                s if s.is_terminal() => s,
                _ => RunStatus::ComposeFailed,
            };
            error!(error = %transition_err, ?fallback, "run failure outside transition table");
            self.lock().status = fallback;
        }
        warn!(error = %err, status = ?self.status(), "transaction run failed");
        self.lock().records.clear();
    }
}
