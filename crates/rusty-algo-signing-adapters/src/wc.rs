use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use rusty_algo_signing_core::{
    CancellationToken, GateTicket, PortError, SignerResolver, SigningFlow, SigningRequestGate,
    SubmissionGateway, TransactionError, TransactionOrchestrator, WalletConnectPort,
};

use crate::SigningAdapterConfig;

pub const USER_REJECTED_CODE: i64 = 4001;
pub const REQUEST_ALREADY_DISPLAYED_CODE: i64 = 4300;
pub const SIGNING_FAILED_CODE: i64 = 4301;

/// A dApp request to sign raw msgpack transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WcSignRequest {
    pub request_id: String,
    pub topic: String,
    pub transactions: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WcResponse {
    Success {
        request_id: String,
        result: Value,
    },
    Error {
        request_id: String,
        code: i64,
        message: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct WalletConnectAdapter {
    inner: Arc<Mutex<WalletConnectState>>,
}

#[derive(Debug, Default)]
struct WalletConnectState {
    requests: HashMap<String, WcSignRequest>,
    responses: Vec<WcResponse>,
}

impl WalletConnectAdapter {
    pub fn in_memory() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, WalletConnectState>, PortError> {
        self.inner
            .lock()
            .map_err(|e| PortError::Transport(format!("wc lock poisoned: {e}")))
    }

    pub fn insert_request(&self, req: WcSignRequest) -> Result<(), PortError> {
        let mut g = self.lock()?;
        g.requests.insert(req.request_id.clone(), req);
        Ok(())
    }

    pub fn pending_request(&self, request_id: &str) -> Result<WcSignRequest, PortError> {
        let g = self.lock()?;
        g.requests
            .get(request_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("wc request missing: {request_id}")))
    }

    pub fn list_pending_requests(&self) -> Result<Vec<WcSignRequest>, PortError> {
        let g = self.lock()?;
        Ok(g.requests.values().cloned().collect())
    }

    /// Drops a request without answering the peer.
    pub fn forget(&self, request_id: &str) -> Result<Option<WcSignRequest>, PortError> {
        let mut g = self.lock()?;
        Ok(g.requests.remove(request_id))
    }

    pub fn responses(&self) -> Result<Vec<WcResponse>, PortError> {
        let g = self.lock()?;
        Ok(g.responses.clone())
    }
}

impl WalletConnectPort for WalletConnectAdapter {
    fn respond_success(&self, request_id: &str, result: Value) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if g.requests.remove(request_id).is_none() {
            return Err(PortError::NotFound(format!(
                "wc request missing for success response: {request_id}"
            )));
        }
        g.responses.push(WcResponse::Success {
            request_id: request_id.to_owned(),
            result,
        });
        Ok(())
    }

    fn respond_error(&self, request_id: &str, code: i64, message: &str) -> Result<(), PortError> {
        let mut g = self.lock()?;
        if g.requests.remove(request_id).is_none() {
            return Err(PortError::NotFound(format!(
                "wc request missing for error response: {request_id}"
            )));
        }
        g.responses.push(WcResponse::Error {
            request_id: request_id.to_owned(),
            code,
            message: message.to_owned(),
        });
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WcRouterError {
    #[error(transparent)]
    Port(#[from] PortError),
    #[error(transparent)]
    Signing(#[from] TransactionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    Displayed,
    AlreadyDisplayed,
}

/// Routes dApp signing requests: one on screen per session topic, signed
/// through the orchestrator and answered on the adapter.
pub struct WalletConnectRouter<G, R> {
    orchestrator: Arc<TransactionOrchestrator<G, R>>,
    adapter: WalletConnectAdapter,
    gate: Arc<SigningRequestGate>,
    tickets: Mutex<HashMap<String, GateTicket>>,
}

impl<G, R> WalletConnectRouter<G, R>
where
    G: SubmissionGateway + 'static,
    R: SignerResolver,
{
    pub fn new(
        orchestrator: Arc<TransactionOrchestrator<G, R>>,
        adapter: WalletConnectAdapter,
        gate: Arc<SigningRequestGate>,
    ) -> Self {
        Self {
            orchestrator,
            adapter,
            gate,
            tickets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(
        orchestrator: Arc<TransactionOrchestrator<G, R>>,
        adapter: WalletConnectAdapter,
        config: &SigningAdapterConfig,
    ) -> Self {
        let gate = Arc::new(SigningRequestGate::with_ttl(config.signing_request_ttl()));
        Self::new(orchestrator, adapter, gate)
    }

    pub fn gate(&self) -> &Arc<SigningRequestGate> {
        &self.gate
    }

    fn lock_tickets(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, GateTicket>>, PortError> {
        self.tickets
            .lock()
            .map_err(|e| PortError::Transport(format!("wc ticket lock poisoned: {e}")))
    }

    /// Gives the topic back if this request still holds it.
    fn release_topic(&self, request_id: &str) -> Result<(), PortError> {
        if let Some(ticket) = self.lock_tickets()?.remove(request_id) {
            self.gate.release_ticket(&ticket);
        }
        Ok(())
    }

    pub fn on_request(&self, req: WcSignRequest) -> Result<InboundOutcome, PortError> {
        let request_id = req.request_id.clone();
        let topic = req.topic.clone();
        self.adapter.insert_request(req)?;

        let mut tickets = self.lock_tickets()?;
        let Some(ticket) = self.gate.acquire(&topic) else {
            drop(tickets);
            warn!(topic = %topic, request_id = %request_id, "signing request already on screen");
            self.adapter.respond_error(
                &request_id,
                REQUEST_ALREADY_DISPLAYED_CODE,
                "Request already displayed",
            )?;
            return Ok(InboundOutcome::AlreadyDisplayed);
        };
        tickets.insert(request_id.clone(), ticket);
        drop(tickets);
        info!(topic = %topic, request_id = %request_id, "signing request displayed");
        Ok(InboundOutcome::Displayed)
    }

    /// Signs the request's transactions and answers with base64 blobs in
    /// request order. The topic is released whatever the outcome.
    pub async fn accept(
        &self,
        request_id: &str,
        cancel: CancellationToken,
    ) -> Result<Vec<String>, WcRouterError> {
        let req = self.adapter.pending_request(request_id)?;
        let signed = self
            .orchestrator
            .sign_external(&req.transactions, SigningFlow::WalletConnect, cancel)
            .await;
        self.release_topic(request_id)?;

        match signed {
            Ok(blobs) => {
                let encoded: Vec<String> = blobs
                    .iter()
                    .map(|b| general_purpose::STANDARD.encode(b))
                    .collect();
                self.adapter
                    .respond_success(request_id, Value::from(encoded.clone()))?;
                Ok(encoded)
            }
            Err(err) => {
                warn!(request_id, error = %err, "dApp signing request failed");
                self.adapter
                    .respond_error(request_id, SIGNING_FAILED_CODE, &err.to_string())?;
                Err(err.into())
            }
        }
    }

    pub fn reject(&self, request_id: &str) -> Result<(), PortError> {
        self.adapter.pending_request(request_id)?;
        self.release_topic(request_id)?;
        self.adapter
            .respond_error(request_id, USER_REJECTED_CODE, "User rejected the request")
    }

    /// The request sheet closed without an answer.
    pub fn dismiss(&self, request_id: &str) -> Result<(), PortError> {
        self.adapter.forget(request_id)?;
        self.release_topic(request_id)
    }
}
