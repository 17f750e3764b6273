#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};

use rusty_algo_signing_core::ledger::apdu::{
    INS_GET_PUBLIC_KEY, INS_SIGN_MSGPACK, P1_FIRST_WITH_ACCOUNT, P2_MORE, SW_OK, SW_USER_REJECTED,
};
use rusty_algo_signing_core::ledger::framing::{frame_apdu, FrameAssembler};
use rusty_algo_signing_core::{
    codec, event_channel, Account, Address, EventSink, LedgerBridge, LedgerDevice,
    LedgerTransport, LocalSigner, MicroAlgos, NetworkParams, OrchestratorSettings,
    PendingTransaction, Signable, SignerResolver, SubmissionGateway, TransactionEvent,
    TransactionOrchestrator, TransportError,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub const MIN_BALANCE: u64 = 100_000;

pub fn local_signer(seed: u8) -> Arc<LocalSigner> {
    Arc::new(LocalSigner::from_seed(&[seed; 32]))
}

pub fn account(address: Address, balance: u64) -> Account {
    Account::new(address, MicroAlgos(balance), MicroAlgos(MIN_BALANCE))
}

pub fn params(min_fee: u64, fee_per_byte: u64) -> NetworkParams {
    NetworkParams {
        last_round: 100,
        fee_per_byte,
        min_fee: MicroAlgos(min_fee),
        genesis_id: "testnet-v1.0".to_owned(),
        genesis_hash: [9u8; 32],
    }
}

#[derive(Default)]
pub struct StaticResolver {
    signers: HashMap<Address, Arc<dyn Signable>>,
    auth: HashMap<Address, Address>,
}

impl StaticResolver {
    pub fn with(mut self, signer: Arc<dyn Signable>) -> Self {
        self.signers.insert(signer.address(), signer);
        self
    }

    pub fn with_auth(mut self, account: Address, auth: Address) -> Self {
        self.auth.insert(account, auth);
        self
    }
}

impl SignerResolver for StaticResolver {
    fn signer_for(&self, address: &Address) -> Option<Arc<dyn Signable>> {
        self.signers.get(address).cloned()
    }

    fn auth_address_of(&self, address: &Address) -> Option<Address> {
        self.auth.get(address).copied()
    }
}

pub struct MockGateway {
    params: Result<NetworkParams, TransportError>,
    submit_results: Mutex<VecDeque<Result<String, TransportError>>>,
    pending_results: Mutex<VecDeque<Result<PendingTransaction, TransportError>>>,
    submissions: Mutex<Vec<Vec<u8>>>,
}

impl MockGateway {
    pub fn new(params: NetworkParams) -> Self {
        Self {
            params: Ok(params),
            submit_results: Mutex::new(VecDeque::new()),
            pending_results: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_params(err: TransportError) -> Self {
        Self {
            params: Err(err),
            ..Self::new(params(1000, 0))
        }
    }

    pub fn with_submit(self, result: Result<String, TransportError>) -> Self {
        self.submit_results.lock().expect("lock").push_back(result);
        self
    }

    pub fn with_pending(self, result: Result<PendingTransaction, TransportError>) -> Self {
        self.pending_results.lock().expect("lock").push_back(result);
        self
    }

    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions.lock().expect("lock").clone()
    }
}

#[async_trait]
impl SubmissionGateway for MockGateway {
    async fn fetch_params(&self) -> Result<NetworkParams, TransportError> {
        self.params.clone()
    }

    async fn submit(&self, signed: &[u8]) -> Result<String, TransportError> {
        let mut submissions = self.submissions.lock().expect("lock");
        submissions.push(signed.to_vec());
        let n = submissions.len();
        self.submit_results
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Ok(format!("txid-{n}")))
    }

    async fn pending_status(&self, _txid: &str) -> Result<PendingTransaction, TransportError> {
        self.pending_results
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or(Ok(PendingTransaction {
                confirmed_round: Some(101),
                pool_error: None,
            }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceScript {
    Approve,
    Reject,
    /// Never answers the final signing command.
    Hang,
}

/// Simulated Ledger speaking framed APDUs. Tracks how many exchanges are
/// open at once.
pub struct MockLedgerTransport {
    key: SigningKey,
    script: DeviceScript,
    mtu: usize,
    latency: Duration,
    assembler: Mutex<FrameAssembler>,
    outbox: Mutex<VecDeque<Vec<u8>>>,
    payload: Mutex<Vec<u8>>,
    hanging: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub signed_payloads: Mutex<Vec<Vec<u8>>>,
}

impl MockLedgerTransport {
    pub fn new(seed: u8, script: DeviceScript) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
            script,
            mtu: 23,
            latency: Duration::from_millis(5),
            assembler: Mutex::new(FrameAssembler::new()),
            outbox: Mutex::new(VecDeque::new()),
            payload: Mutex::new(Vec::new()),
            hanging: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            signed_payloads: Mutex::new(Vec::new()),
        }
    }

    pub fn address(&self) -> Address {
        Address::new(self.key.verifying_key().to_bytes())
    }

    fn respond(&self, data: &[u8], status: u16) {
        let mut response = data.to_vec();
        response.extend_from_slice(&status.to_be_bytes());
        let frames = frame_apdu(&response, self.mtu).expect("frame response");
        self.outbox.lock().expect("lock").extend(frames);
    }

    fn handle(&self, apdu: &[u8]) {
        let (ins, p1, p2, data) = (apdu[1], apdu[2], apdu[3], &apdu[5..]);
        match ins {
            INS_GET_PUBLIC_KEY => {
                let key = self.key.verifying_key().to_bytes();
                self.respond(&key, SW_OK);
            }
            INS_SIGN_MSGPACK => {
                let mut payload = self.payload.lock().expect("lock");
                if p1 == P1_FIRST_WITH_ACCOUNT {
                    payload.clear();
                    payload.extend_from_slice(&data[4..]);
                } else {
                    payload.extend_from_slice(data);
                }
                if p2 == P2_MORE {
                    drop(payload);
                    self.respond(&[], SW_OK);
                    return;
                }
                let message = codec::bytes_to_sign(&payload);
                self.signed_payloads
                    .lock()
                    .expect("lock")
                    .push(payload.clone());
                drop(payload);
                match self.script {
                    DeviceScript::Approve => {
                        let signature = self.key.sign(&message).to_bytes();
                        self.respond(&signature, SW_OK);
                    }
                    DeviceScript::Reject => self.respond(&[], SW_USER_REJECTED),
                    DeviceScript::Hang => self.hanging.store(true, Ordering::SeqCst),
                }
            }
            _ => self.respond(&[], 0x6d00),
        }
    }
}

#[async_trait]
impl LedgerTransport for MockLedgerTransport {
    async fn scan(&self) -> Result<LedgerDevice, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(LedgerDevice {
            id: "ble-1".to_owned(),
            name: "Nano X".to_owned(),
        })
    }

    async fn stop_scan(&self) {}

    async fn connect(&self, _device: &LedgerDevice) -> Result<usize, TransportError> {
        Ok(self.mtu)
    }

    async fn write(&self, frame: &[u8]) -> Result<(), TransportError> {
        let complete = self
            .assembler
            .lock()
            .expect("lock")
            .push(frame)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        if let Some(apdu) = complete {
            self.handle(&apdu);
        }
        Ok(())
    }

    async fn read(&self) -> Result<Vec<u8>, TransportError> {
        tokio::time::sleep(self.latency).await;
        let next = self.outbox.lock().expect("lock").pop_front();
        match next {
            Some(frame) => Ok(frame),
            None if self.hanging.load(Ordering::SeqCst) => std::future::pending().await,
            None => Err(TransportError::Connectivity("no response".to_owned())),
        }
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.outbox.lock().expect("lock").clear();
        self.hanging.store(false, Ordering::SeqCst);
    }
}

pub type TestOrchestrator = TransactionOrchestrator<MockGateway, StaticResolver>;

pub fn new_orchestrator(
    gateway: MockGateway,
    resolver: StaticResolver,
) -> (Arc<MockGateway>, TestOrchestrator, UnboundedReceiver<TransactionEvent>) {
    let gateway = Arc::new(gateway);
    let (events, rx) = event_channel();
    let orch = TransactionOrchestrator::new(
        Arc::clone(&gateway),
        resolver,
        OrchestratorSettings::default(),
        events,
    );
    (gateway, orch, rx)
}

pub fn ledger_bridge(transport: Arc<MockLedgerTransport>) -> Arc<LedgerBridge> {
    Arc::new(LedgerBridge::new(transport))
}

pub fn drain(rx: &mut UnboundedReceiver<TransactionEvent>) -> Vec<TransactionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

pub fn quiet_events() -> EventSink {
    EventSink::disabled()
}
