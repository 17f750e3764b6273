//! algod REST gateway:
//! - GET  /v2/transactions/params
//! - POST /v2/transactions            (raw signed bytes, application/x-binary)
//! - GET  /v2/transactions/pending/{txid}

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use rusty_algo_signing_core::{
    MicroAlgos, NetworkParams, PendingTransaction, PortError, SubmissionGateway, TransportError,
};

use crate::SigningAdapterConfig;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ParamsResponse {
    fee: u64,
    genesis_hash: String,
    genesis_id: String,
    last_round: u64,
    min_fee: u64,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(rename = "txId")]
    tx_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PendingResponse {
    #[serde(default)]
    confirmed_round: Option<u64>,
    #[serde(default)]
    pool_error: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Clone)]
pub struct AlgodAdapter {
    base_url: String,
    client: Client,
}

impl AlgodAdapter {
    pub fn with_config(config: &SigningAdapterConfig) -> Result<Self, PortError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.algod_token {
            let value = HeaderValue::from_str(token)
                .map_err(|e| PortError::Validation(format!("algod token header: {e}")))?;
            headers.insert(TOKEN_HEADER, value);
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| PortError::Transport(format!("algod client init: {e}")))?;
        Ok(Self {
            base_url: config.algod_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn connectivity(err: reqwest::Error) -> TransportError {
    TransportError::Connectivity(err.to_string())
}

/// Maps non-2xx replies to `Api` with the node's message when it sent one.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.bytes().await.map_err(connectivity)?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(TransportError::Api {
            status: status.as_u16(),
            message,
        });
    }
    serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
}

#[async_trait]
impl SubmissionGateway for AlgodAdapter {
    async fn fetch_params(&self) -> Result<NetworkParams, TransportError> {
        let response = self
            .client
            .get(self.url("/v2/transactions/params"))
            .send()
            .await
            .map_err(connectivity)?;
        let params: ParamsResponse = read_json(response).await?;

        let hash = general_purpose::STANDARD
            .decode(&params.genesis_hash)
            .map_err(|e| TransportError::Decode(format!("genesis-hash: {e}")))?;
        let genesis_hash: [u8; 32] = hash
            .try_into()
            .map_err(|h: Vec<u8>| TransportError::Decode(format!("genesis-hash of {} bytes", h.len())))?;
        debug!(last_round = params.last_round, fee = params.fee, "network params fetched");

        Ok(NetworkParams {
            last_round: params.last_round,
            fee_per_byte: params.fee,
            min_fee: MicroAlgos(params.min_fee),
            genesis_id: params.genesis_id,
            genesis_hash,
        })
    }

    async fn submit(&self, signed: &[u8]) -> Result<String, TransportError> {
        let response = self
            .client
            .post(self.url("/v2/transactions"))
            .header(CONTENT_TYPE, "application/x-binary")
            .body(signed.to_vec())
            .send()
            .await
            .map_err(connectivity)?;
        let submitted: SubmitResponse = read_json(response).await?;
        debug!(txid = %submitted.tx_id, bytes = signed.len(), "signed payload accepted");
        Ok(submitted.tx_id)
    }

    async fn pending_status(&self, txid: &str) -> Result<PendingTransaction, TransportError> {
        let response = self
            .client
            .get(self.url(&format!("/v2/transactions/pending/{txid}")))
            .send()
            .await
            .map_err(connectivity)?;
        let pending: PendingResponse = read_json(response).await?;
        Ok(PendingTransaction {
            confirmed_round: pending.confirmed_round.filter(|r| *r > 0),
            pool_error: Some(pending.pool_error).filter(|e| !e.is_empty()),
        })
    }
}
