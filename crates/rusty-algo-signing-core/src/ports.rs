use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{Address, Arc59SendSummary, NetworkParams, PendingTransaction};
use crate::error::TransportError;
use crate::signer::Signable;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    async fn fetch_params(&self) -> Result<NetworkParams, TransportError>;
    /// Uploads one signed blob; returns the node's id for its first transaction.
    async fn submit(&self, signed: &[u8]) -> Result<String, TransportError>;
    async fn pending_status(&self, txid: &str) -> Result<PendingTransaction, TransportError>;
}

pub trait SignerResolver: Send + Sync {
    fn signer_for(&self, address: &Address) -> Option<Arc<dyn Signable>>;

    fn auth_address_of(&self, _address: &Address) -> Option<Address> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arc59InboxRequest {
    pub asset_id: u64,
    pub amount: u64,
    pub senders: Vec<Address>,
}

#[async_trait]
pub trait Arc59InboxPort: Send + Sync {
    async fn fetch_send_summary(
        &self,
        receiver: &Address,
        asset_id: u64,
    ) -> Result<Arc59SendSummary, TransportError>;
    async fn fetch_requests(&self, address: &Address)
        -> Result<Vec<Arc59InboxRequest>, TransportError>;
}

pub trait WalletConnectPort {
    fn respond_success(&self, request_id: &str, result: Value) -> Result<(), PortError>;
    fn respond_error(&self, request_id: &str, code: i64, message: &str) -> Result<(), PortError>;
}
