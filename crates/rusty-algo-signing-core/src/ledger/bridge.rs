use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::{Address, SigningOutcome};
use crate::error::{SignError, TransportError};
use crate::events::{EventSink, LedgerEvent, TransactionEvent};
use crate::signer::SigningContext;
use crate::state_machine::{ledger_transition, LedgerAction, LedgerStatus};

use super::apdu::{self, ApduResponse};
use super::framing::{frame_apdu, FrameAssembler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDevice {
    pub id: String,
    pub name: String,
}

/// Link to a nearby device. `connect` returns the negotiated MTU.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn scan(&self) -> Result<LedgerDevice, TransportError>;
    async fn stop_scan(&self);
    async fn connect(&self, device: &LedgerDevice) -> Result<usize, TransportError>;
    async fn write(&self, frame: &[u8]) -> Result<(), TransportError>;
    async fn read(&self) -> Result<Vec<u8>, TransportError>;
    async fn disconnect(&self);
}

#[derive(Debug, Clone, Copy)]
pub struct LedgerSignRequest<'a> {
    pub account_index: u32,
    pub expected_signer: Address,
    pub payload: &'a [u8],
}

fn unreachable(err: TransportError) -> SignError {
    SignError::LedgerDeviceUnreachable(err.to_string())
}

/// Drives one device exchange at a time; a second request while busy fails
/// with `LedgerBusy`.
pub struct LedgerBridge {
    transport: Arc<dyn LedgerTransport>,
    status: Mutex<LedgerStatus>,
}

struct InFlight<'a> {
    bridge: &'a LedgerBridge,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut status = self.bridge.lock_status();
        if *status != LedgerStatus::Idle {
            debug!(from = ?*status, "ledger flight dropped, forcing idle");
            *status = LedgerStatus::Idle;
        }
    }
}

impl LedgerBridge {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self {
            transport,
            status: Mutex::new(LedgerStatus::Idle),
        }
    }

    pub fn status(&self) -> LedgerStatus {
        *self.lock_status()
    }

    fn lock_status(&self) -> MutexGuard<'_, LedgerStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, action: LedgerAction, events: &EventSink) -> Result<(), SignError> {
        let mut status = self.lock_status();
        let (next, transition) = ledger_transition(*status, action)
            .map_err(|e| SignError::LedgerDeviceUnreachable(e.to_string()))?;
        *status = next;
        drop(status);
        debug!(from = ?transition.from, to = ?transition.to, reason = transition.reason, "ledger state");
        events.emit(TransactionEvent::LedgerStateChanged(transition));
        Ok(())
    }

    fn advance_or_log(&self, action: LedgerAction, events: &EventSink) {
        if let Err(err) = self.advance(action, events) {
            debug!(error = %err, ?action, "ledger transition skipped");
        }
    }

    fn begin(&self, events: &EventSink) -> Result<InFlight<'_>, SignError> {
        {
            let status = self.lock_status();
            if *status != LedgerStatus::Idle {
                return Err(SignError::LedgerBusy);
            }
        }
        self.advance(LedgerAction::Scan, events)?;
        Ok(InFlight { bridge: self })
    }

    pub async fn sign(
        &self,
        request: &LedgerSignRequest<'_>,
        ctx: &SigningContext,
    ) -> Result<[u8; 64], SignError> {
        let flight = self.begin(&ctx.events)?;
        info!(index = ctx.index, watchdog_ms = ctx.watchdog.as_millis() as u64, "ledger signing started");

        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(SignError::Cancelled),
            _ = tokio::time::sleep(ctx.watchdog) => Err(SignError::LedgerTimeout),
            result = self.drive(request, ctx) => result,
        };

        let emit = |event: LedgerEvent| {
            ctx.events.emit(TransactionEvent::Ledger {
                index: ctx.index,
                event,
            })
        };
        match &outcome {
            Ok(_) => {}
            Err(SignError::LedgerRejected) => {
                warn!(index = ctx.index, "ledger signing rejected on device");
                self.advance_or_log(LedgerAction::Reject, &ctx.events);
                emit(LedgerEvent::Rejected);
            }
            Err(SignError::LedgerTimeout) => {
                warn!(index = ctx.index, "ledger watchdog expired");
                self.advance_or_log(LedgerAction::Timeout, &ctx.events);
                emit(LedgerEvent::TimedOut);
            }
            Err(err) => {
                warn!(index = ctx.index, error = %err, "ledger signing aborted");
                emit(LedgerEvent::Reset);
            }
        }

        self.transport.stop_scan().await;
        self.transport.disconnect().await;
        self.advance_or_log(LedgerAction::Reset, &ctx.events);
        drop(flight);
        outcome
    }

    /// Forces the bridge back to idle and drops the device link.
    pub async fn reset(&self, events: &EventSink) {
        if self.status() == LedgerStatus::Idle {
            return;
        }
        self.transport.stop_scan().await;
        self.transport.disconnect().await;
        self.advance_or_log(LedgerAction::Reset, events);
    }

    /// Forces the bridge idle without waiting on the device; the link is
    /// closed on a background task when a runtime is available.
    pub fn release(&self, events: &EventSink) {
        if self.status() != LedgerStatus::Idle {
            self.advance_or_log(LedgerAction::Reset, events);
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let transport = Arc::clone(&self.transport);
                handle.spawn(async move {
                    transport.stop_scan().await;
                    transport.disconnect().await;
                });
            }
            Err(_) => debug!("no runtime to close the ledger link"),
        }
    }

    async fn drive(
        &self,
        request: &LedgerSignRequest<'_>,
        ctx: &SigningContext,
    ) -> Result<[u8; 64], SignError> {
        let emit = |event: LedgerEvent| {
            ctx.events.emit(TransactionEvent::Ledger {
                index: ctx.index,
                event,
            })
        };

        let device = self.transport.scan().await.map_err(unreachable)?;
        emit(LedgerEvent::DeviceFound {
            name: device.name.clone(),
        });
        let mtu = self.transport.connect(&device).await.map_err(unreachable)?;
        self.advance(LedgerAction::Connect, &ctx.events)?;

        let key = self
            .exchange(&apdu::get_public_key(request.account_index), mtu)
            .await?
            .ensure_ok()?;
        let key: [u8; 32] = key
            .get(..32)
            .and_then(|x| x.try_into().ok())
            .ok_or_else(|| {
                SignError::LedgerDeviceUnreachable(format!("public key of {} bytes", key.len()))
            })?;
        let found = Address::new(key);
        if found != request.expected_signer {
            return Err(SignError::LedgerAddressMismatch {
                expected: request.expected_signer,
                found,
            });
        }

        self.advance(LedgerAction::RequestSignature, &ctx.events)?;
        let commands = apdu::sign_msgpack(request.account_index, request.payload);
        let last = commands.len().saturating_sub(1);
        let mut signature = Vec::new();
        for (i, command) in commands.iter().enumerate() {
            if i == last {
                emit(LedgerEvent::ApprovalRequested {
                    device_name: device.name.clone(),
                });
                ctx.events.emit(TransactionEvent::Signing {
                    index: ctx.index,
                    outcome: SigningOutcome::LedgerApprovalRequested(device.name.clone()),
                });
            }
            let data = self.exchange(command, mtu).await?.ensure_ok()?;
            if i == last {
                signature = data;
            }
        }

        let signature: [u8; 64] = signature
            .get(..64)
            .and_then(|x| x.try_into().ok())
            .ok_or_else(|| {
                SignError::LedgerDeviceUnreachable(format!(
                    "signature of {} bytes",
                    signature.len()
                ))
            })?;
        self.advance(LedgerAction::ReceiveSignature, &ctx.events)?;
        emit(LedgerEvent::SignatureReceived);
        Ok(signature)
    }

    async fn exchange(&self, command: &[u8], mtu: usize) -> Result<ApduResponse, SignError> {
        let frames =
            frame_apdu(command, mtu).map_err(|e| SignError::LedgerDeviceUnreachable(e.to_string()))?;
        for frame in &frames {
            self.transport.write(frame).await.map_err(unreachable)?;
        }
        let mut assembler = FrameAssembler::new();
        loop {
            let frame = self.transport.read().await.map_err(unreachable)?;
            if let Some(response) = assembler
                .push(&frame)
                .map_err(|e| SignError::LedgerDeviceUnreachable(e.to_string()))?
            {
                return ApduResponse::parse(&response);
            }
        }
    }
}
