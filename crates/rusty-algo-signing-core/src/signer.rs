use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::domain::{Address, SigningFlow, UnsignedTransactionItem};
use crate::error::SignError;
use crate::events::EventSink;
use crate::ledger::{LedgerBridge, LedgerSignRequest};

/// Per-record signing context handed down by the orchestrator.
#[derive(Debug, Clone)]
pub struct SigningContext {
    pub index: usize,
    pub flow: SigningFlow,
    pub watchdog: Duration,
    pub cancel: CancellationToken,
    pub events: EventSink,
}

#[async_trait]
pub trait Signable: Send + Sync {
    fn address(&self) -> Address;

    fn is_hardware(&self) -> bool {
        false
    }

    /// Returns the signed envelope for `item`.
    async fn sign(
        &self,
        item: &UnsignedTransactionItem,
        ctx: &SigningContext,
    ) -> Result<Vec<u8>, SignError>;
}

fn envelope(item: &UnsignedTransactionItem, signature: &[u8; 64]) -> Vec<u8> {
    let auth = item.is_rekeyed().then_some(&item.signer);
    codec::encode_signed(&item.raw_bytes, signature, auth)
}

pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let key = SigningKey::from_bytes(seed);
        let address = Address::new(key.verifying_key().to_bytes());
        Self { key, address }
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signable for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(
        &self,
        item: &UnsignedTransactionItem,
        _ctx: &SigningContext,
    ) -> Result<Vec<u8>, SignError> {
        if item.signer != self.address {
            return Err(SignError::LocalSigningFailed(format!(
                "key for {} cannot sign for {}",
                self.address, item.signer
            )));
        }
        let signature = self.key.sign(&codec::bytes_to_sign(&item.raw_bytes));
        Ok(envelope(item, &signature.to_bytes()))
    }
}

pub struct LedgerSigner {
    bridge: Arc<LedgerBridge>,
    account_index: u32,
    address: Address,
}

impl LedgerSigner {
    pub fn new(bridge: Arc<LedgerBridge>, account_index: u32, address: Address) -> Self {
        Self {
            bridge,
            account_index,
            address,
        }
    }
}

#[async_trait]
impl Signable for LedgerSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn is_hardware(&self) -> bool {
        true
    }

    async fn sign(
        &self,
        item: &UnsignedTransactionItem,
        ctx: &SigningContext,
    ) -> Result<Vec<u8>, SignError> {
        let request = LedgerSignRequest {
            account_index: self.account_index,
            expected_signer: self.address,
            payload: &item.raw_bytes,
        };
        let signature = self.bridge.sign(&request, ctx).await?;
        Ok(envelope(item, &signature))
    }
}
